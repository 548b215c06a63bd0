// Crate-level lints: Allow common graphics patterns that pedantic lints flag
#![allow(clippy::cast_possible_truncation)] // Intentional u64->u32, f64->f32 casts for pixel and timing math
#![allow(clippy::cast_precision_loss)] // u64->f64 in percentage calculations
#![allow(clippy::cast_possible_wrap)] // u32->i32 wrapping is acceptable for our value ranges
#![allow(clippy::cast_sign_loss)] // i32->u32 where we know sign is positive
#![allow(clippy::module_name_repetitions)] // MarqueeState in marquee, StatSource in stats

//! Two-line system status renderer for small monochrome OLED panels.
//!
//! Line 1 shows the host name, line 2 rotates through system stats (uptime,
//! IP address, load, CPU, memory, disk, temperature, power). Lines wider than
//! the panel scroll as a marquee.
//!
//! # Architecture
//!
//! ```text
//!  SystemProbe ──► ProbeCache ──► StatSource ──► LineText ×2
//!  (procfs, cmds)   (per-family      (formatting,      │
//!                    TTL)             N/A fallback)    ▼
//!                                               MarqueeState ×2
//!                                  TextRasterizer ──► Bitmap, scroll offset
//!                                                      │
//!                     BurnInShifter ── offset ──►  StatusScreen::tick
//!                                                      │
//!                                                      ▼
//!                                          DisplaySink::begin_frame ──► commit on drop
//! ```
//!
//! # Scroll Continuity
//!
//! A stat like `CPU: 42.0%` changes every refresh. Restarting the marquee from
//! the right edge every time would make a long line unreadable, so the new text
//! is compared to the old one by [`template::template_key`]: numbers become `#`
//! and IPv4 addresses become `<ip>`. Matching keys keep the scroll position.

pub mod burnin;
pub mod cache;
pub mod config;
pub mod display;
pub mod marquee;
pub mod probes;
pub mod profiling;
pub mod raster;
pub mod screen;
pub mod shutdown;
pub mod stats;
pub mod template;
