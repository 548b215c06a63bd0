//! Display sinks: where composited frames end up.
//!
//! A sink owns a 1-bit draw target. Each tick the screen asks for a [`Frame`],
//! draws into it, and drops it. Dropping the frame commits it (pushes the
//! buffer to the panel or window), so a tick that bails out early still leaves
//! the display consistent with whatever was drawn.
//!
//! # Implementations
//!
//! - [`FrameBuffer`]: in-memory bitmap, used when running headless and in tests.
//! - [`SimulatorSink`]: an embedded-graphics-simulator display. With the
//!   `window` feature it also opens an SDL window and reports when it is closed.

use core::ops::{Deref, DerefMut};

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::SimulatorDisplay;
#[cfg(feature = "window")]
use embedded_graphics_simulator::{BinaryColorTheme, OutputSettingsBuilder, SimulatorEvent, Window};

use crate::raster::Bitmap;

/// Output device for composited frames.
pub trait DisplaySink {
    type Target: DrawTarget<Color = BinaryColor> + OriginDimensions;

    fn target(&self) -> &Self::Target;

    fn target_mut(&mut self) -> &mut Self::Target;

    /// Push the current contents of the target to the device.
    fn commit(&mut self);

    /// Whether the user asked to stop (window closed). Headless sinks never do.
    fn should_close(&self) -> bool { false }

    /// Clear the target and start a new frame. The frame commits when dropped.
    fn begin_frame(&mut self) -> Frame<'_, Self>
    where
        Self: Sized,
    {
        self.target_mut().clear(BinaryColor::Off).ok();
        Frame { sink: self }
    }
}

/// One frame in progress. Derefs to the sink's draw target.
pub struct Frame<'a, S: DisplaySink> {
    sink: &'a mut S,
}

impl<S: DisplaySink> Deref for Frame<'_, S> {
    type Target = S::Target;

    fn deref(&self) -> &Self::Target { self.sink.target() }
}

impl<S: DisplaySink> DerefMut for Frame<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target { self.sink.target_mut() }
}

impl<S: DisplaySink> Drop for Frame<'_, S> {
    fn drop(&mut self) { self.sink.commit(); }
}

// =============================================================================
// Frame Buffer
// =============================================================================

/// Headless sink backed by a [`Bitmap`].
///
/// Keeps a copy of the last committed frame so callers can inspect what would
/// have been shown.
pub struct FrameBuffer {
    buffer: Bitmap,
    committed: Bitmap,
    commits: u64,
}

impl FrameBuffer {
    pub fn new(size: Size) -> Self {
        let buffer = Bitmap::blank(size.width, size.height);
        Self { committed: buffer.clone(), buffer, commits: 0 }
    }

    /// Last committed frame.
    #[inline]
    pub const fn committed(&self) -> &Bitmap { &self.committed }

    #[inline]
    pub const fn commits(&self) -> u64 { self.commits }
}

impl DisplaySink for FrameBuffer {
    type Target = Bitmap;

    fn target(&self) -> &Bitmap { &self.buffer }

    fn target_mut(&mut self) -> &mut Bitmap { &mut self.buffer }

    fn commit(&mut self) {
        self.committed.clone_from(&self.buffer);
        self.commits += 1;
    }
}

// =============================================================================
// Simulator
// =============================================================================

/// Sink backed by [`SimulatorDisplay`], optionally shown in an SDL window.
pub struct SimulatorSink {
    display: SimulatorDisplay<BinaryColor>,
    #[cfg(feature = "window")]
    window: Window,
    closed: bool,
    commits: u64,
}

impl SimulatorSink {
    /// Headless simulator display.
    #[cfg(not(feature = "window"))]
    pub fn new(size: Size, _title: &str) -> Self {
        Self { display: SimulatorDisplay::new(size), closed: false, commits: 0 }
    }

    /// Simulator display shown in a window styled like a white OLED panel.
    #[cfg(feature = "window")]
    pub fn new(size: Size, title: &str) -> Self {
        let output_settings = OutputSettingsBuilder::new()
            .theme(BinaryColorTheme::OledWhite)
            .scale(4)
            .build();
        Self {
            display: SimulatorDisplay::new(size),
            window: Window::new(title, &output_settings),
            closed: false,
            commits: 0,
        }
    }

    #[inline]
    pub const fn commits(&self) -> u64 { self.commits }
}

impl DisplaySink for SimulatorSink {
    type Target = SimulatorDisplay<BinaryColor>;

    fn target(&self) -> &Self::Target { &self.display }

    fn target_mut(&mut self) -> &mut Self::Target { &mut self.display }

    fn commit(&mut self) {
        #[cfg(feature = "window")]
        {
            self.window.update(&self.display);
            if self.window.events().any(|ev| matches!(ev, SimulatorEvent::Quit)) {
                tracing::info!("window closed");
                self.closed = true;
            }
        }
        self.commits += 1;
    }

    fn should_close(&self) -> bool { self.closed }
}

// =============================================================================
// Tests
// =============================================================================
