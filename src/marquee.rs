//! Per-line marquee state.
//!
//! Each display line owns a [`MarqueeState`]: the last text it rendered, the
//! bitmap for that text, and (for lines wider than the display) a horizontal
//! scroll offset that moves left every tick.
//!
//! # Text Changes
//!
//! When the text changes the bitmap is rebuilt. What happens to the scroll
//! position depends on whether the new text is the "same line with new numbers"
//! (see [`crate::template`]):
//!
//! | Before     | Template match | After       | Offset                          |
//! |------------|----------------|-------------|---------------------------------|
//! | scrolling  | yes            | scrolling   | kept, rescaled by width ratio   |
//! | scrolling  | no             | scrolling   | reset to right edge             |
//! | any        | any            | static      | 0                               |
//! | static     | any            | scrolling   | reset to right edge             |
//!
//! # Scrolling
//!
//! A scrolling line is drawn at `scroll_offset`, plus a second copy one
//! `width + gap` further right when that copy starts on screen. This gives a
//! continuous loop with a fixed gap between repetitions. After drawing, the
//! offset moves left by the scroll speed and wraps by `width + gap` once the
//! first copy has fully left the screen.

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

use crate::raster::{Bitmap, TextRasterizer};
use crate::template::is_continuous;

/// Maximum characters kept per line. Longer text is truncated before comparison.
pub const LINE_CAPACITY: usize = 96;

/// Text of one display line.
pub type LineText = heapless::String<LINE_CAPACITY>;

/// Copy `text` into a [`LineText`], dropping whatever does not fit.
pub fn line_text(text: &str) -> LineText {
    let mut line = LineText::new();
    for c in text.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}

/// Scroll state and cached bitmap for one display line.
pub struct MarqueeState {
    /// Last rendered text; `None` until the first update.
    current_text: Option<LineText>,

    /// Bitmap of `current_text`. Replaced whole on every text change.
    glyph: Bitmap,

    /// Pixel width of `glyph` (always >= 1).
    width: u32,

    /// X position of the first copy while scrolling, 0 otherwise.
    scroll_offset: i32,

    /// True iff `width > display_width`.
    is_scrolling: bool,

    display_width: u32,
    gap_px: i32,
    speed_px: i32,
}

impl MarqueeState {
    /// Empty state for a line on a display `display_width` pixels wide.
    pub fn new(display_width: u32, gap_px: i32, speed_px: i32, line_height: u32) -> Self {
        let glyph = Bitmap::blank(1, line_height);
        Self {
            current_text: None,
            width: glyph.width(),
            glyph,
            scroll_offset: 0,
            is_scrolling: false,
            display_width,
            gap_px,
            speed_px,
        }
    }

    #[inline]
    pub fn text(&self) -> Option<&str> { self.current_text.as_deref() }

    #[inline]
    pub const fn glyph(&self) -> &Bitmap { &self.glyph }

    #[inline]
    pub const fn width(&self) -> u32 { self.width }

    #[inline]
    pub const fn scroll_offset(&self) -> i32 { self.scroll_offset }

    #[inline]
    pub const fn is_scrolling(&self) -> bool { self.is_scrolling }

    /// Distance after which the scroll loop repeats.
    #[inline]
    pub const fn period(&self) -> i32 { self.width as i32 + self.gap_px }

    /// Feed this tick's text. Returns `true` if the text changed.
    ///
    /// A bitmap that fails to rasterize is replaced by a blank 1px glyph so the
    /// width arithmetic below stays well-defined.
    pub fn update<R>(&mut self, text: &str, rasterizer: &R) -> bool
    where
        R: TextRasterizer + ?Sized,
    {
        let text = line_text(text);
        if self.current_text.as_ref() == Some(&text) {
            return false;
        }

        let continuity = self.is_scrolling && is_continuous(self.text(), Some(text.as_str()));

        let glyph = rasterizer.rasterize(&text).unwrap_or_else(|err| {
            tracing::warn!(%err, text = text.as_str(), "rasterization failed, drawing blank line");
            Bitmap::blank(1, rasterizer.line_height())
        });
        let old_width = self.width;
        self.width = glyph.width();
        self.glyph = glyph;
        self.current_text = Some(text);
        self.is_scrolling = self.width > self.display_width;

        if !continuity || !self.is_scrolling {
            self.scroll_offset = if self.is_scrolling { self.display_width as i32 } else { 0 };
        } else if old_width != self.width && old_width > 0 {
            // Keep the same relative position; truncates toward zero
            let scaled = i64::from(self.scroll_offset) * i64::from(self.width) / i64::from(old_width);
            self.scroll_offset = scaled as i32;
        }

        true
    }

    /// Draw the line with its top edge at `y`, translated by `shift`.
    pub fn draw<D>(&self, target: &mut D, y: i32, shift: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        if !self.is_scrolling {
            return self.glyph.draw_at(target, Point::new(0, y) + shift);
        }

        self.glyph.draw_at(target, Point::new(self.scroll_offset, y) + shift)?;
        let second = self.scroll_offset + self.period();
        if second < self.display_width as i32 {
            self.glyph.draw_at(target, Point::new(second, y) + shift)?;
        }
        Ok(())
    }

    /// Move a scrolling line one tick to the left. No-op for static lines.
    pub fn advance(&mut self) {
        if !self.is_scrolling {
            return;
        }
        self.scroll_offset -= self.speed_px;
        let period = self.period();
        if self.scroll_offset < -period {
            self.scroll_offset += period;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::raster::{MonoRasterizer, RasterError};

    const DISPLAY_WIDTH: u32 = 128;
    const GAP: i32 = 24;
    const SPEED: i32 = 4;
    const HEIGHT: u32 = 8;

    /// Every character is `px_per_char` wide; counts rasterize calls.
    struct FixedWidth {
        px_per_char: u32,
        calls: Cell<u32>,
    }

    impl FixedWidth {
        fn new(px_per_char: u32) -> Self { Self { px_per_char, calls: Cell::new(0) } }
    }

    impl TextRasterizer for FixedWidth {
        fn line_height(&self) -> u32 { HEIGHT }

        fn rasterize(&self, text: &str) -> Result<Bitmap, RasterError> {
            self.calls.set(self.calls.get() + 1);
            let mut bitmap = Bitmap::blank(text.chars().count() as u32 * self.px_per_char, HEIGHT);
            Pixel(Point::zero(), BinaryColor::On).draw(&mut bitmap).ok();
            Ok(bitmap)
        }
    }

    struct Failing;

    impl TextRasterizer for Failing {
        fn line_height(&self) -> u32 { HEIGHT }

        fn rasterize(&self, _text: &str) -> Result<Bitmap, RasterError> { Err(RasterError::TooWide(u32::MAX)) }
    }

    fn state() -> MarqueeState { MarqueeState::new(DISPLAY_WIDTH, GAP, SPEED, HEIGHT) }

    #[test]
    fn test_new_state_is_empty() {
        let state = state();
        assert!(state.text().is_none());
        assert_eq!(state.width(), 1);
        assert!(!state.is_scrolling());
        assert_eq!(state.scroll_offset(), 0);
    }

    #[test]
    fn test_short_text_is_static() {
        let raster = FixedWidth::new(8);
        let mut state = state();
        assert!(state.update("host", &raster));

        assert_eq!(state.width(), 32);
        assert!(!state.is_scrolling());
        assert_eq!(state.scroll_offset(), 0);

        for _ in 0..10 {
            state.advance();
        }
        assert_eq!(state.scroll_offset(), 0, "Static lines never move");
    }

    #[test]
    fn test_exact_width_does_not_scroll() {
        let raster = FixedWidth::new(8);
        let mut state = state();
        state.update(&"x".repeat(16), &raster);
        assert_eq!(state.width(), DISPLAY_WIDTH);
        assert!(!state.is_scrolling());
    }

    #[test]
    fn test_wide_text_starts_at_right_edge() {
        let raster = FixedWidth::new(8);
        let mut state = state();
        state.update(&"x".repeat(20), &raster);
        assert_eq!(state.width(), 160);
        assert!(state.is_scrolling());
        assert_eq!(state.scroll_offset(), DISPLAY_WIDTH as i32);
    }

    #[test]
    fn test_same_text_does_not_rerasterize() {
        let raster = FixedWidth::new(8);
        let mut state = state();
        assert!(state.update("CPU: 1%", &raster));
        assert!(!state.update("CPU: 1%", &raster));
        assert_eq!(raster.calls.get(), 1);
    }

    #[test]
    fn test_scroll_wraps_after_period() {
        // 160px text, 24px gap, 4px/tick: period 184px = 46 ticks
        let raster = FixedWidth::new(8);
        let mut state = state();
        state.update(&"x".repeat(20), &raster);
        let start = state.scroll_offset();
        let period = state.period();
        assert_eq!(period, 184);

        for _ in 0..46 {
            state.advance();
        }
        assert_eq!((state.scroll_offset() - start).rem_euclid(period), 0);

        // Once in the steady loop the offset repeats exactly every 46 ticks
        for _ in 0..100 {
            state.advance();
        }
        let steady = state.scroll_offset();
        for _ in 0..46 {
            state.advance();
            assert!(state.scroll_offset() >= -period, "Offset is wrapped, not clamped");
        }
        assert_eq!(state.scroll_offset(), steady);
    }

    #[test]
    fn test_template_change_preserves_offset() {
        let raster = FixedWidth::new(16);
        let mut state = state();
        state.update("CPU: 42.0%", &raster);
        assert!(state.is_scrolling());
        for _ in 0..10 {
            state.advance();
        }
        let offset = state.scroll_offset();

        state.update("CPU: 57.3%", &raster);
        assert_eq!(state.scroll_offset(), offset, "Same width, same template keeps offset");
    }

    #[test]
    fn test_template_change_rescales_offset() {
        let raster = FixedWidth::new(16);
        let mut state = state();
        state.update("CPU: 9.0%", &raster); // 9 chars, 144px
        for _ in 0..3 {
            state.advance();
        }
        assert_eq!(state.scroll_offset(), 116);

        state.update("CPU: 10.0%", &raster); // 10 chars, 160px
        assert_eq!(state.scroll_offset(), 116 * 160 / 144);
    }

    #[test]
    fn test_rescale_truncates_toward_zero() {
        let raster = FixedWidth::new(16);
        let mut state = state();
        state.update("CPU: 9.0%", &raster);
        for _ in 0..40 {
            state.advance();
        }
        let offset = state.scroll_offset();
        assert!(offset < 0);

        state.update("CPU: 10.0%", &raster);
        let exact = f64::from(offset) * 160.0 / 144.0;
        assert_eq!(state.scroll_offset(), exact.trunc() as i32);
    }

    #[test]
    fn test_structural_change_resets_offset() {
        let raster = FixedWidth::new(16);
        let mut state = state();
        state.update("CPU: 42.0%", &raster);
        for _ in 0..10 {
            state.advance();
        }

        state.update("Mem:412M/3G 13%", &raster);
        assert!(state.is_scrolling());
        assert_eq!(state.scroll_offset(), DISPLAY_WIDTH as i32);
    }

    #[test]
    fn test_static_to_scrolling_resets_offset() {
        // Template matches but the old line was static: nothing to preserve
        let raster = FixedWidth::new(16);
        let mut state = state();
        state.update("Up:1h", &raster);
        assert!(!state.is_scrolling());

        state.update("Up:1000000h", &raster);
        assert!(state.is_scrolling());
        assert_eq!(state.scroll_offset(), DISPLAY_WIDTH as i32);
    }

    #[test]
    fn test_scrolling_to_static_resets_offset() {
        let raster = FixedWidth::new(16);
        let mut state = state();
        state.update("Up:1000000h", &raster);
        state.advance();

        state.update("Up:1h", &raster);
        assert!(!state.is_scrolling());
        assert_eq!(state.scroll_offset(), 0);
    }

    #[test]
    fn test_rasterize_failure_falls_back_to_blank() {
        let mut state = state();
        assert!(state.update("anything", &Failing));
        assert_eq!(state.text(), Some("anything"));
        assert_eq!(state.width(), 1);
        assert_eq!(state.glyph().height(), HEIGHT);
        assert!(!state.is_scrolling());
    }

    #[test]
    fn test_long_text_truncated() {
        let text = "a".repeat(LINE_CAPACITY + 10);
        assert_eq!(line_text(&text).len(), LINE_CAPACITY);
    }

    #[test]
    fn test_draw_static_with_shift() {
        let raster = FixedWidth::new(8);
        let mut state = state();
        state.update("ab", &raster);

        let mut frame = Bitmap::blank(DISPLAY_WIDTH, 32);
        state.draw(&mut frame, 16, Point::new(2, 1)).ok();
        assert!(frame.pixel(2, 17));
        assert_eq!(frame.count_lit(), 1);
    }

    #[test]
    fn test_draw_second_copy_when_on_screen() {
        let raster = FixedWidth::new(8);
        let mut state = state();
        state.update(&"x".repeat(20), &raster); // 160px, period 184

        // Scroll until the second copy (offset + 184) starts inside the display
        while state.scroll_offset() + state.period() >= DISPLAY_WIDTH as i32 {
            state.advance();
        }
        let offset = state.scroll_offset();

        let mut frame = Bitmap::blank(DISPLAY_WIDTH, 32);
        state.draw(&mut frame, 0, Point::zero()).ok();
        let second_x = (offset + state.period()) as u32;
        assert!(frame.pixel(second_x, 0), "Second copy drawn at {second_x}");
    }

    #[test]
    fn test_burn_in_shifts_scrolling_line() {
        /// Lights the first and last column of every bitmap.
        struct Edges;

        impl TextRasterizer for Edges {
            fn line_height(&self) -> u32 { HEIGHT }

            fn rasterize(&self, text: &str) -> Result<Bitmap, RasterError> {
                let width = text.chars().count() as u32 * 8;
                let mut bitmap = Bitmap::blank(width, HEIGHT);
                Pixel(Point::zero(), BinaryColor::On).draw(&mut bitmap).ok();
                Pixel(Point::new(width as i32 - 1, 0), BinaryColor::On).draw(&mut bitmap).ok();
                Ok(bitmap)
            }
        }

        let mut state = state();
        state.update(&"x".repeat(20), &Edges); // 160px, period 184
        while state.scroll_offset() + state.period() >= DISPLAY_WIDTH as i32 {
            state.advance();
        }
        let offset = state.scroll_offset();
        let first_end = offset + state.width() as i32 - 1;
        let second_start = offset + state.period();
        assert!(first_end >= 0 && second_start < DISPLAY_WIDTH as i32, "Both copies partly on screen");

        let mut plain = Bitmap::blank(DISPLAY_WIDTH, 32);
        state.draw(&mut plain, 8, Point::zero()).ok();
        let shift = Point::new(-2, 1);
        let mut shifted = Bitmap::blank(DISPLAY_WIDTH, 32);
        state.draw(&mut shifted, 8, shift).ok();

        assert_eq!(state.scroll_offset(), offset, "Drawing does not move the marquee");
        assert_eq!(
            plain.lit_pixels().collect::<Vec<_>>(),
            vec![Point::new(first_end, 8), Point::new(second_start, 8)]
        );
        let expected: Vec<Point> = plain.lit_pixels().map(|p| p + shift).collect();
        assert_eq!(shifted.lit_pixels().collect::<Vec<_>>(), expected, "Both copies move by the offset");
    }

    #[test]
    fn test_real_font_scenario() {
        let raster = MonoRasterizer::with_points(12);
        let mut state = state();
        state.update("Mem:412M/3906M 10% used of total", &raster);
        assert!(state.is_scrolling());
        state.update("raspberrypi", &raster);
        assert!(!state.is_scrolling());
        assert_eq!(state.scroll_offset(), 0);
    }
}
