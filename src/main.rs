//! `status-oled`: render host status to a 128x32 OLED-style display.
//!
//! Runs headless by default (frames go to an in-memory simulator display).
//! Build with `--features window` to mirror the panel in an SDL window; closing
//! the window stops the loop.
//!
//! Settings come from the TOML file named by `STATUS_OLED_CONFIG`
//! (`/etc/status-oled.toml` if unset). Log verbosity follows `RUST_LOG`.
//! SIGINT and SIGTERM stop the loop after the current tick.

use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use embedded_graphics::prelude::Size;
use status_oled::cache::ProbeCache;
use status_oled::config::Settings;
use status_oled::display::{DisplaySink, SimulatorSink};
use status_oled::probes::LinuxProbe;
use status_oled::profiling::FrameStats;
use status_oled::raster::MonoRasterizer;
use status_oled::screen::StatusScreen;
use status_oled::shutdown::ShutdownFlag;
use status_oled::stats::StatSource;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(%err, "invalid settings");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = match ShutdownFlag::install() {
        Ok(shutdown) => shutdown,
        Err(err) => {
            tracing::error!(%err, "cannot install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let display = &settings.display;
    let mut sink = SimulatorSink::new(Size::new(display.width, display.height), "status-oled");
    let rasterizers = display.font_points.map(MonoRasterizer::with_points);
    let mut stats = StatSource::new(LinuxProbe::new(), ProbeCache::new(&settings.cache));
    let mut screen = StatusScreen::new(&settings, rasterizers, Instant::now());
    let mut frame_stats = FrameStats::new();

    let tick = settings.tick();
    tracing::info!(
        width = settings.display.width,
        height = settings.display.height,
        tick_ms = tick.as_millis() as u64,
        "status display started"
    );

    // ==========================================================================
    // Main Render Loop
    // ==========================================================================

    while !sink.should_close() && !shutdown.is_requested() {
        let frame_start = Instant::now();

        let rotated = screen.tick(frame_start, &mut stats, &mut sink);
        if rotated {
            frame_stats.log_summary();
        }

        let render_time = frame_start.elapsed();

        // Sleep out the rest of the tick; an overrun starts the next tick immediately
        let sleep_time = tick.checked_sub(render_time).unwrap_or_default();
        if !sleep_time.is_zero() {
            thread::sleep(sleep_time);
        }

        frame_stats.record_frame(frame_start.elapsed(), render_time, sleep_time);
    }

    if shutdown.is_requested() {
        tracing::info!("termination signal received");
    }
    frame_stats.log_summary();
    tracing::info!(frames = frame_stats.total_frames, uptime_s = frame_stats.uptime().as_secs(), "status display stopped");
    ExitCode::SUCCESS
}
