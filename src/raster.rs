//! 1-bit bitmaps and text rasterization.
//!
//! A line of text is rendered once into an exact-width [`Bitmap`] and then blitted
//! every tick. Scrolling is just drawing the same bitmap at a different x offset,
//! so glyph rasterization only happens when the text actually changes.
//!
//! [`Bitmap`] is also a [`DrawTarget`], which lets embedded-graphics render text
//! straight into it and lets the headless frame buffer reuse the same type.
//!
//! # Layout
//!
//! Rows are packed MSB-first, `ceil(width / 8)` bytes per row (the same layout
//! `ImageRaw<BinaryColor>` uses).

use core::convert::Infallible;
use core::fmt;

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::{Baseline, Text};
use profont::{
    PROFONT_7_POINT,
    PROFONT_9_POINT,
    PROFONT_10_POINT,
    PROFONT_12_POINT,
    PROFONT_14_POINT,
    PROFONT_18_POINT,
    PROFONT_24_POINT,
};

/// Line height used when a font reports zero-height glyphs.
pub const FALLBACK_LINE_HEIGHT: u32 = 12;

/// Widest glyph image we are willing to allocate.
pub const MAX_GLYPH_WIDTH: u32 = 8192;

// =============================================================================
// Errors
// =============================================================================

/// Text that cannot be turned into a single-line bitmap.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RasterError {
    /// Rendered width exceeds [`MAX_GLYPH_WIDTH`].
    TooWide(u32),
    /// Control characters (newlines, tabs, ...) would break the single-row layout.
    ControlChar(char),
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooWide(width) => write!(f, "text is {width}px wide (limit {MAX_GLYPH_WIDTH}px)"),
            Self::ControlChar(c) => write!(f, "control character {c:?} in text"),
        }
    }
}

impl std::error::Error for RasterError {}

// =============================================================================
// Bitmap
// =============================================================================

/// Owned 1-bit image.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bitmap {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// All-off bitmap. Both dimensions are clamped to at least one pixel.
    pub fn blank(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let stride = width.div_ceil(8) as usize;
        Self { width, height, stride, data: vec![0; stride * height as usize] }
    }

    #[inline]
    pub const fn width(&self) -> u32 { self.width }

    #[inline]
    pub const fn height(&self) -> u32 { self.height }

    /// Whether the pixel at `(x, y)` is lit. Out-of-range reads are off.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[y as usize * self.stride + (x / 8) as usize];
        byte & (0x80 >> (x % 8)) != 0
    }

    /// Number of lit pixels.
    pub fn count_lit(&self) -> usize { self.data.iter().map(|b| b.count_ones() as usize).sum() }

    fn set(&mut self, x: u32, y: u32, on: bool) {
        let index = y as usize * self.stride + (x / 8) as usize;
        let mask = 0x80 >> (x % 8);
        if on {
            self.data[index] |= mask;
        } else {
            self.data[index] &= !mask;
        }
    }

    /// Coordinates of every lit pixel, row by row.
    pub fn lit_pixels(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).filter(move |&x| self.pixel(x, y)).map(move |x| Point::new(x as i32, y as i32))
        })
    }

    /// Draw the lit pixels with the top-left corner at `origin`.
    ///
    /// Off pixels are transparent, so overlapping draws OR together.
    pub fn draw_at<D>(&self, target: &mut D, origin: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        target.draw_iter(self.lit_pixels().map(|p| Pixel(p + origin, BinaryColor::On)))
    }
}

impl OriginDimensions for Bitmap {
    fn size(&self) -> Size { Size::new(self.width, self.height) }
}

impl DrawTarget for Bitmap {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            // Clip silently like hardware frame buffers do
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.set(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Rasterizer
// =============================================================================

/// Turns a line of text into a bitmap.
pub trait TextRasterizer {
    /// Height of every bitmap this rasterizer produces.
    fn line_height(&self) -> u32;

    /// Measure and render `text`. Empty text yields a 1px-wide blank bitmap.
    fn rasterize(&self, text: &str) -> Result<Bitmap, RasterError>;
}

/// Pick the largest ProFont size not above `points` (7pt is the floor).
pub fn font_for_points(points: u32) -> &'static MonoFont<'static> {
    match points {
        0..=8 => &PROFONT_7_POINT,
        9 => &PROFONT_9_POINT,
        10..=11 => &PROFONT_10_POINT,
        12..=13 => &PROFONT_12_POINT,
        14..=17 => &PROFONT_14_POINT,
        18..=23 => &PROFONT_18_POINT,
        _ => &PROFONT_24_POINT,
    }
}

/// Monospace rasterizer backed by an embedded-graphics [`MonoFont`].
#[derive(Clone, Copy)]
pub struct MonoRasterizer {
    style: MonoTextStyle<'static, BinaryColor>,
    height: u32,
}

impl MonoRasterizer {
    pub fn new(font: &'static MonoFont<'static>) -> Self {
        let height = match font.character_size.height {
            0 => FALLBACK_LINE_HEIGHT,
            h => h,
        };
        Self { style: MonoTextStyle::new(font, BinaryColor::On), height }
    }

    /// Rasterizer for the ProFont size closest to `points`.
    pub fn with_points(points: u32) -> Self { Self::new(font_for_points(points)) }

    /// Pixel width of `text` without rendering it.
    pub fn measure(&self, text: &str) -> u32 {
        self.style.measure_string(text, Point::zero(), Baseline::Top).bounding_box.size.width
    }
}

impl TextRasterizer for MonoRasterizer {
    fn line_height(&self) -> u32 { self.height }

    fn rasterize(&self, text: &str) -> Result<Bitmap, RasterError> {
        if let Some(c) = text.chars().find(|c| c.is_control()) {
            return Err(RasterError::ControlChar(c));
        }
        let width = self.measure(text);
        if width > MAX_GLYPH_WIDTH {
            return Err(RasterError::TooWide(width));
        }

        let mut bitmap = Bitmap::blank(width, self.height);
        Text::with_baseline(text, Point::zero(), self.style, Baseline::Top).draw(&mut bitmap).ok();
        Ok(bitmap)
    }
}

// =============================================================================
// Tests
// =============================================================================
