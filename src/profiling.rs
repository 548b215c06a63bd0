//! Frame timing statistics for the render loop.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = FrameStats::new();
//!
//! // In main loop:
//! let frame_start = Instant::now();
//! // ... tick ...
//! let render_time = frame_start.elapsed();
//! // ... sleep ...
//! stats.record_frame(frame_start.elapsed(), render_time, sleep_time);
//!
//! // On stat rotation and at shutdown:
//! stats.log_summary();
//! ```

use std::time::{Duration, Instant};

/// Frame timing and counters, updated once per tick.
pub struct FrameStats {
    // Frame timing (microseconds for precision)
    /// Total frame time (render + sleep + overhead)
    pub frame_time_us: u32,
    /// Time spent producing and drawing the lines
    pub render_time_us: u32,
    /// Time spent sleeping to hold the tick rate
    pub sleep_time_us: u32,

    /// Minimum frame time observed
    pub frame_time_min_us: u32,
    /// Maximum frame time observed
    pub frame_time_max_us: u32,
    /// Exponential moving average of frame time
    frame_time_avg_us: f32,

    /// Ticks whose render time alone exceeded the tick budget
    pub overruns: u32,
    /// Total frames rendered since startup
    pub total_frames: u64,

    start_time: Instant,
}

impl FrameStats {
    /// Exponential moving average alpha (0.1 for smooth updates).
    const EMA_ALPHA: f32 = 0.1;

    pub fn new() -> Self {
        Self {
            frame_time_us: 0,
            render_time_us: 0,
            sleep_time_us: 0,
            frame_time_min_us: u32::MAX,
            frame_time_max_us: 0,
            frame_time_avg_us: 0.0,
            overruns: 0,
            total_frames: 0,
            start_time: Instant::now(),
        }
    }

    /// Record timing for one frame. A frame that did not sleep counts as an overrun.
    pub fn record_frame(&mut self, total_time: Duration, render_time: Duration, sleep_time: Duration) {
        let total_us = total_time.as_micros() as u32;

        self.frame_time_us = total_us;
        self.render_time_us = render_time.as_micros() as u32;
        self.sleep_time_us = sleep_time.as_micros() as u32;

        self.frame_time_min_us = self.frame_time_min_us.min(total_us);
        self.frame_time_max_us = self.frame_time_max_us.max(total_us);

        if self.total_frames == 0 {
            self.frame_time_avg_us = total_us as f32;
        } else {
            self.frame_time_avg_us =
                Self::EMA_ALPHA.mul_add(total_us as f32, (1.0 - Self::EMA_ALPHA) * self.frame_time_avg_us);
        }

        if sleep_time.is_zero() {
            self.overruns += 1;
        }
        self.total_frames += 1;
    }

    /// Average frame time in microseconds.
    #[inline]
    pub const fn frame_time_avg_us(&self) -> u32 { self.frame_time_avg_us as u32 }

    /// Achieved frame rate from the average frame time.
    pub fn fps(&self) -> f32 {
        match self.frame_time_avg_us() {
            0 => 0.0,
            avg => 1_000_000.0 / avg as f32,
        }
    }

    #[inline]
    pub fn uptime(&self) -> Duration { self.start_time.elapsed() }

    /// Emit the current numbers at debug level.
    pub fn log_summary(&self) {
        if self.total_frames == 0 {
            return;
        }
        tracing::debug!(
            frames = self.total_frames,
            avg_us = self.frame_time_avg_us(),
            min_us = self.frame_time_min_us,
            max_us = self.frame_time_max_us,
            render_us = self.render_time_us,
            overruns = self.overruns,
            fps = self.fps(),
            "frame stats"
        );
    }
}

impl Default for FrameStats {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Tests
// =============================================================================
