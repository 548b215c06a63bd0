//! The two-line status screen and its per-tick update.
//!
//! ```text
//! ┌────────────────────────────────┐
//! │ raspberrypi                    │  line 1: host name (burn-in shifted)
//! │ CPU: 12.5%                     │  line 2: rotating stat
//! └────────────────────────────────┘
//! ```
//!
//! # Tick Order
//!
//! 1. Advance the burn-in shifter if its interval elapsed.
//! 2. Produce the text for both lines through the stat source (cached probes).
//! 3. Feed each text to its line's marquee state.
//! 4. Draw both lines into a fresh frame and advance scrolling lines; the frame
//!    commits when it goes out of scope.
//! 5. Rotate line 2 to the next stat if the rotation interval elapsed.
//!
//! Nothing in a tick can fail: probe errors become placeholder text and draw
//! errors are dropped, so the loop keeps running on a degraded host.

use std::time::Instant;

use embedded_graphics::prelude::Point;

use crate::burnin::BurnInShifter;
use crate::config::{LINE_COUNT, Settings};
use crate::display::DisplaySink;
use crate::marquee::{LineText, MarqueeState};
use crate::probes::SystemProbe;
use crate::raster::TextRasterizer;
use crate::stats::{Rotation, StatKind, StatSource};

/// Host name line.
pub const HOST_LINE: usize = 0;

/// Rotating stat line.
pub const STAT_LINE: usize = 1;

/// Screen state carried between ticks.
pub struct StatusScreen<R> {
    lines: [MarqueeState; LINE_COUNT],
    rasterizers: [R; LINE_COUNT],
    line_y: [i32; LINE_COUNT],
    /// Lines that follow the burn-in offset.
    burn_in_lines: [bool; LINE_COUNT],
    shifter: BurnInShifter,
    rotation: Rotation,
    frames: u64,
}

impl<R: TextRasterizer> StatusScreen<R> {
    pub fn new(settings: &Settings, rasterizers: [R; LINE_COUNT], now: Instant) -> Self {
        let lines = core::array::from_fn(|i| {
            MarqueeState::new(
                settings.display.width,
                settings.scroll.gap_px,
                settings.scroll.speed_px,
                rasterizers[i].line_height(),
            )
        });
        let burn_in = &settings.burn_in;

        Self {
            lines,
            rasterizers,
            line_y: settings.display.line_y,
            burn_in_lines: burn_in.lines,
            shifter: BurnInShifter::new(burn_in.max_x, burn_in.max_y, settings.burn_in_interval(), now),
            rotation: Rotation::new(&settings.rotation.stats, settings.rotation_interval(), now),
            frames: 0,
        }
    }

    /// Run one render tick. Returns `true` if line 2 rotated to a new stat.
    pub fn tick<P, S>(&mut self, now: Instant, stats: &mut StatSource<P>, sink: &mut S) -> bool
    where
        P: SystemProbe,
        S: DisplaySink,
    {
        if self.shifter.update(now) {
            let offset = self.shifter.offset();
            tracing::debug!(x = offset.x, y = offset.y, "burn-in shift");
        }

        let texts: [LineText; LINE_COUNT] = [stats.host_line(now), stats.stat_line(self.rotation.current(), now)];
        for ((line, text), rasterizer) in self.lines.iter_mut().zip(&texts).zip(&self.rasterizers) {
            line.update(text, rasterizer);
        }

        {
            let mut frame = sink.begin_frame();
            for (i, line) in self.lines.iter_mut().enumerate() {
                let shift = if self.burn_in_lines[i] { self.shifter.offset() } else { Point::zero() };
                line.draw(&mut *frame, self.line_y[i], shift).ok();
                line.advance();
            }
        }
        self.frames += 1;
        tracing::trace!(frame = self.frames, host = texts[HOST_LINE].as_str(), stat = texts[STAT_LINE].as_str());

        let rotated = self.rotation.update(now);
        if rotated {
            tracing::debug!(stat = ?self.rotation.current(), "rotating stat line");
        }
        rotated
    }

    #[inline]
    pub fn line(&self, index: usize) -> &MarqueeState { &self.lines[index] }

    #[inline]
    pub fn current_stat(&self) -> StatKind { self.rotation.current() }

    #[inline]
    pub fn burn_in_offset(&self) -> Point { self.shifter.offset() }

    /// Ticks rendered so far.
    #[inline]
    pub const fn frames(&self) -> u64 { self.frames }
}

// =============================================================================
// Tests
// =============================================================================
