//! Time-to-live cache in front of the system probes.
//!
//! Some probes spawn a process (`hostname -I`, `vcgencmd`, `df`) and can take
//! tens of milliseconds. The render loop runs at ~20 FPS and asks for its stat
//! line every tick, so each probe family sits behind a [`CacheEntry`] that only
//! lets the probe run once per TTL window.
//!
//! # Refresh Rules
//!
//! - Within TTL of the last attempt: the cached value is served, the probe is
//!   not called.
//! - TTL elapsed: the probe runs. On success the value and fetch time are
//!   replaced. On failure the previous good value is kept (stale data beats a
//!   blank line) and the probe is tried again once another TTL has passed.
//!
//! Time is passed in explicitly so tests can drive the cache with synthetic
//! instants.

use std::time::{Duration, Instant};

use crate::config::CacheSettings;
use crate::probes::{DiskUsage, PowerStatus, ProbeError};

/// One cached probe result.
pub struct CacheEntry<T> {
    /// Probe family name for logs.
    name: &'static str,
    ttl: Duration,
    value: Option<T>,
    /// When `value` was last fetched successfully.
    last_fetch: Option<Instant>,
    /// When the probe last ran, successful or not.
    last_attempt: Option<Instant>,
    /// Number of probe invocations.
    refreshes: u32,
}

impl<T> CacheEntry<T> {
    pub const fn new(name: &'static str, ttl: Duration) -> Self {
        Self { name, ttl, value: None, last_fetch: None, last_attempt: None, refreshes: 0 }
    }

    /// Whether the probe is allowed to run at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(attempt) => now.saturating_duration_since(attempt) > self.ttl,
        }
    }

    /// Return the cached value, refreshing it through `probe` if the TTL has elapsed.
    ///
    /// `None` only if no probe call has ever succeeded.
    pub fn get_or_refresh<F>(&mut self, now: Instant, probe: F) -> Option<&T>
    where
        F: FnOnce() -> Result<T, ProbeError>,
    {
        if self.is_due(now) {
            self.last_attempt = Some(now);
            self.refreshes = self.refreshes.saturating_add(1);
            match probe() {
                Ok(value) => {
                    tracing::debug!(probe = self.name, "cache refreshed");
                    self.value = Some(value);
                    self.last_fetch = Some(now);
                }
                Err(err) => {
                    tracing::warn!(probe = self.name, %err, stale = self.value.is_some(), "probe failed");
                }
            }
        }
        self.value.as_ref()
    }

    /// Cached value without refreshing.
    #[inline]
    pub const fn value(&self) -> Option<&T> { self.value.as_ref() }

    #[inline]
    pub const fn last_fetch(&self) -> Option<Instant> { self.last_fetch }

    #[inline]
    pub const fn ttl(&self) -> Duration { self.ttl }

    #[inline]
    pub const fn refreshes(&self) -> u32 { self.refreshes }

    #[inline]
    pub const fn name(&self) -> &'static str { self.name }
}

/// One entry per probe family.
pub struct ProbeCache {
    pub host: CacheEntry<String>,
    pub ip: CacheEntry<String>,
    /// CPU busy percentage, 0-100.
    pub cpu: CacheEntry<f32>,
    /// Throttle flags and temperature share one refresh.
    pub power: CacheEntry<PowerStatus>,
    pub disk: CacheEntry<DiskUsage>,
}

impl ProbeCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            host: CacheEntry::new("host", settings.host_ttl()),
            ip: CacheEntry::new("ip", settings.ip_ttl()),
            cpu: CacheEntry::new("cpu", settings.cpu_ttl()),
            power: CacheEntry::new("power", settings.power_ttl()),
            disk: CacheEntry::new("disk", settings.disk_ttl()),
        }
    }
}

impl Default for ProbeCache {
    fn default() -> Self { Self::new(&CacheSettings::default()) }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn test_first_call_fetches() {
        let now = Instant::now();
        let mut entry = CacheEntry::new("test", ms(1000));
        assert!(entry.value().is_none());
        assert_eq!(entry.get_or_refresh(now, || Ok(7)), Some(&7));
        assert_eq!(entry.last_fetch(), Some(now));
        assert_eq!(entry.refreshes(), 1);
    }

    #[test]
    fn test_ttl_window_scenario() {
        // 1s TTL polled every 100ms for 1.5s: at most two probe calls
        let start = Instant::now();
        let calls = Cell::new(0);
        let mut entry = CacheEntry::new("cpu", ms(1000));

        for tick in 0..=15 {
            entry.get_or_refresh(start + ms(tick * 100), || {
                calls.set(calls.get() + 1);
                Ok(calls.get())
            });
        }

        assert_eq!(calls.get(), 2);
        assert_eq!(entry.value(), Some(&2));
        assert_eq!(entry.last_fetch(), Some(start + ms(1100)));
    }

    #[test]
    fn test_ttl_boundary_is_exclusive() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("test", ms(1000));
        entry.get_or_refresh(start, || Ok(1));

        assert!(!entry.is_due(start + ms(1000)));
        assert_eq!(entry.get_or_refresh(start + ms(1000), || Ok(2)), Some(&1));
        assert_eq!(entry.get_or_refresh(start + ms(1001), || Ok(2)), Some(&2));
    }

    #[test]
    fn test_failure_keeps_last_value() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("test", ms(1000));
        entry.get_or_refresh(start, || Ok(5));

        let value = entry.get_or_refresh(start + ms(1500), || Err(ProbeError::Parse("test")));
        assert_eq!(value, Some(&5), "Stale value served after a failed refresh");
        assert_eq!(entry.last_fetch(), Some(start), "Fetch time not reset by failure");
    }

    #[test]
    fn test_failure_retried_after_ttl() {
        let start = Instant::now();
        let calls = Cell::new(0);
        let mut entry: CacheEntry<u32> = CacheEntry::new("test", ms(1000));
        let failing = || {
            calls.set(calls.get() + 1);
            Err(ProbeError::Unavailable("test"))
        };

        assert!(entry.get_or_refresh(start, failing).is_none());
        // Not hammered on every tick
        for tick in 1..=10 {
            entry.get_or_refresh(start + ms(tick * 100), failing);
        }
        assert_eq!(calls.get(), 1);

        // Retry once the TTL has passed again, and recover
        assert_eq!(entry.get_or_refresh(start + ms(1100), || Ok(9)), Some(&9));
    }

    #[test]
    fn test_never_more_than_once_per_window() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("test", ms(300));
        let mut fetch_times = Vec::new();

        for tick in 0..200u64 {
            let now = start + ms(tick * 7);
            let before = entry.refreshes();
            entry.get_or_refresh(now, || Ok(tick));
            if entry.refreshes() != before {
                fetch_times.push(now);
            }
        }

        for pair in fetch_times.windows(2) {
            assert!(pair[1] - pair[0] > ms(300));
        }
    }

    #[test]
    fn test_probe_cache_uses_settings() {
        let settings = CacheSettings { cpu_secs: 0.25, ..CacheSettings::default() };
        let cache = ProbeCache::new(&settings);
        assert_eq!(cache.cpu.ttl(), ms(250));
        assert_eq!(cache.power.ttl(), settings.power_ttl());
        assert_eq!(cache.ip.name(), "ip");
    }
}
