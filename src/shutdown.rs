//! Ctrl-C / SIGTERM handling for the render loop.
//!
//! The first SIGINT or SIGTERM only raises a flag; the loop notices it at the
//! next tick, logs its frame stats, and returns. A second signal while the
//! flag is already set exits immediately with status 1, for a loop stuck
//! inside a slow probe.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;

/// Set once a termination signal has arrived.
#[derive(Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Register the flag for SIGINT and SIGTERM.
    pub fn install() -> io::Result<Self> {
        let requested = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            // Order matters: the conditional exit must see the flag before this signal sets it
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&requested))?;
            flag::register(signal, Arc::clone(&requested))?;
        }
        Ok(Self(requested))
    }

    #[inline]
    pub fn is_requested(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

// =============================================================================
// Tests
// =============================================================================
