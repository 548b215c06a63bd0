//! Burn-in mitigation by periodic pixel shifting.
//!
//! OLED pixels that stay lit for long periods age faster than their neighbours,
//! leaving a ghost of static content. The host name line rarely changes, so it
//! is nudged by a pixel or two every [`BURN_IN_INTERVAL`](crate::config::BURN_IN_INTERVAL).
//!
//! # Offset Sequence
//!
//! The sequence is built once and walked in order, wrapping at the end:
//!
//! ```text
//! (0,0)
//! (+1,0) (-1,0) ... (+max_x,0) (-max_x,0)          horizontal
//! (0,+1) (0,-1) ... (0,+max_y) (0,-max_y)          vertical
//! (+x,+y) (-x,+y) (+x,-y) (-x,-y) for each x, y    diagonal
//! ```
//!
//! Length is `1 + 2*max_x + 2*max_y + 4*max_x*max_y`, and `(0,0)` appears once.

use std::time::{Duration, Instant};

use embedded_graphics::prelude::Point;

/// Build the deterministic offset sequence for the given maxima.
///
/// Maxima above `i32::MAX` are clamped. Callers keep them within the panel
/// size (see [`Settings::validate`](crate::config::Settings::validate)).
pub fn offset_sequence(max_x: u32, max_y: u32) -> Vec<Point> {
    let mut offsets = Vec::with_capacity(sequence_len(max_x, max_y).unwrap_or(0));
    let max_x = i32::try_from(max_x).unwrap_or(i32::MAX);
    let max_y = i32::try_from(max_y).unwrap_or(i32::MAX);

    offsets.push(Point::zero());
    for x in 1..=max_x {
        offsets.push(Point::new(x, 0));
        offsets.push(Point::new(-x, 0));
    }
    for y in 1..=max_y {
        offsets.push(Point::new(0, y));
        offsets.push(Point::new(0, -y));
    }
    for x in 1..=max_x {
        for y in 1..=max_y {
            offsets.push(Point::new(x, y));
            offsets.push(Point::new(-x, y));
            offsets.push(Point::new(x, -y));
            offsets.push(Point::new(-x, -y));
        }
    }

    offsets
}

/// `1 + 2*max_x + 2*max_y + 4*max_x*max_y`, or `None` if it overflows `usize`.
pub fn sequence_len(max_x: u32, max_y: u32) -> Option<usize> {
    let (x, y) = (usize::try_from(max_x).ok()?, usize::try_from(max_y).ok()?);
    let axes = x.checked_add(y)?.checked_mul(2)?;
    let diagonals = x.checked_mul(y)?.checked_mul(4)?;
    axes.checked_add(diagonals)?.checked_add(1)
}

/// Walks the offset sequence on a timer.
pub struct BurnInShifter {
    offsets: Vec<Point>,
    index: usize,
    interval: Duration,
    last_shift: Instant,
}

impl BurnInShifter {
    /// Start at `(0,0)`; the first shift happens `interval` after `now`.
    pub fn new(max_x: u32, max_y: u32, interval: Duration, now: Instant) -> Self {
        Self { offsets: offset_sequence(max_x, max_y), index: 0, interval, last_shift: now }
    }

    /// Advance one position if the interval has elapsed. Returns `true` on a shift.
    pub fn update(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_shift) < self.interval {
            return false;
        }
        self.index = (self.index + 1) % self.offsets.len();
        self.last_shift = now;
        true
    }

    /// Current offset.
    #[inline]
    pub fn offset(&self) -> Point { self.offsets[self.index] }

    #[inline]
    pub const fn index(&self) -> usize { self.index }

    #[inline]
    pub fn offsets(&self) -> &[Point] { &self.offsets }
}

// =============================================================================
// Tests
// =============================================================================
