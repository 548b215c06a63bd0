//! Line producers: host name on line 1, rotating system stats on line 2.
//!
//! Every producer returns display-ready text and never fails. When a probe is
//! unavailable the line shows a placeholder (`N/A`, or `0.0.0.0` for the IP
//! address) instead, so a missing `vcgencmd` on a non-Pi host just means a
//! `Pwr: N/A` line rather than a stalled display.
//!
//! # Line Formats
//!
//! | Stat          | Example                  |
//! |---------------|--------------------------|
//! | Uptime        | `Up:26h4m`               |
//! | Ip            | `IP:192.168.1.20`        |
//! | Load          | `Load: 0.42`             |
//! | Cpu           | `CPU: 12.5%`             |
//! | Memory        | `Mem:412M/3G 10%`        |
//! | Disk          | `Disk: 9G/28G 33%`       |
//! | Temperature   | `Temp: 48.3C`            |
//! | Power         | `Pwr: OK`, `Pwr: UV THR` |

use core::fmt::Write;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::cache::ProbeCache;
use crate::marquee::{LineText, line_text};
use crate::probes::{CpuTimes, PowerStatus, SystemProbe, throttle};

/// Placeholder for a value that could not be read.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder address when no interface has one.
pub const DEFAULT_IP: &str = "0.0.0.0";

// =============================================================================
// Stat Rotation
// =============================================================================

/// Stats that can appear on the second line.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Uptime,
    Ip,
    Load,
    Cpu,
    Memory,
    Disk,
    Temperature,
    Power,
}

impl StatKind {
    /// Default rotation order.
    pub const ALL: [Self; 8] = [
        Self::Uptime,
        Self::Ip,
        Self::Load,
        Self::Cpu,
        Self::Memory,
        Self::Disk,
        Self::Temperature,
        Self::Power,
    ];
}

/// Cycles through the configured stats on a timer.
pub struct Rotation {
    stats: Vec<StatKind>,
    index: usize,
    interval: Duration,
    last_switch: Instant,
}

impl Rotation {
    /// An empty list falls back to [`StatKind::ALL`].
    pub fn new(stats: &[StatKind], interval: Duration, now: Instant) -> Self {
        let stats = if stats.is_empty() { StatKind::ALL.to_vec() } else { stats.to_vec() };
        Self { stats, index: 0, interval, last_switch: now }
    }

    #[inline]
    pub fn current(&self) -> StatKind { self.stats[self.index] }

    /// Move to the next stat if the interval has elapsed. Returns `true` on a switch.
    pub fn update(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_switch) < self.interval {
            return false;
        }
        self.index = (self.index + 1) % self.stats.len();
        self.last_switch = now;
        true
    }
}

// =============================================================================
// CPU Usage
// =============================================================================

/// Turns cumulative `/proc/stat` counters into a busy percentage.
#[derive(Default)]
pub struct CpuSampler {
    prev: Option<CpuTimes>,
}

impl CpuSampler {
    /// Busy percentage since the previous sample (since boot for the first one).
    pub fn sample(&mut self, times: CpuTimes) -> f32 {
        let (idle, total) = match self.prev {
            Some(prev) => (times.idle.saturating_sub(prev.idle), times.total.saturating_sub(prev.total)),
            None => (times.idle, times.total),
        };
        self.prev = Some(times);

        if total == 0 {
            return 0.0;
        }
        let busy = total.saturating_sub(idle);
        (busy as f64 * 100.0 / total as f64) as f32
    }
}

// =============================================================================
// Formatting Helpers
// =============================================================================

/// Compact byte count: `512B`, `3K`, `412M`, `3G`. Truncates like integer division.
pub fn bytes_to_human(n: u64) -> heapless::String<12> {
    const SYMBOLS: [char; 4] = ['K', 'M', 'G', 'T'];

    let mut s = heapless::String::new();
    for (i, symbol) in SYMBOLS.iter().enumerate().rev() {
        let threshold = 1u64 << ((i + 1) * 10);
        if n >= threshold {
            write!(s, "{}{symbol}", n / threshold).ok();
            return s;
        }
    }
    write!(s, "{n}B").ok();
    s
}

/// `label` followed by [`NOT_AVAILABLE`].
fn unavailable(label: &str) -> LineText {
    let mut line = line_text(label);
    line.push_str(NOT_AVAILABLE).ok();
    line
}

// =============================================================================
// Stat Source
// =============================================================================

/// Produces line text from a probe backend through the probe cache.
pub struct StatSource<P> {
    probe: P,
    cache: ProbeCache,
    cpu: CpuSampler,
}

impl<P: SystemProbe> StatSource<P> {
    pub fn new(probe: P, cache: ProbeCache) -> Self { Self { probe, cache, cpu: CpuSampler::default() } }

    #[inline]
    pub const fn probe(&self) -> &P { &self.probe }

    /// Line 1: the host name.
    pub fn host_line(&mut self, now: Instant) -> LineText {
        let Self { probe, cache, .. } = self;
        match cache.host.get_or_refresh(now, || probe.hostname()) {
            Some(name) => line_text(name),
            None => line_text(NOT_AVAILABLE),
        }
    }

    /// Line 2: the given stat.
    pub fn stat_line(&mut self, kind: StatKind, now: Instant) -> LineText {
        match kind {
            StatKind::Uptime => self.uptime_line(),
            StatKind::Ip => self.ip_line(now),
            StatKind::Load => self.load_line(),
            StatKind::Cpu => self.cpu_line(now),
            StatKind::Memory => self.memory_line(),
            StatKind::Disk => self.disk_line(now),
            StatKind::Temperature => self.temperature_line(now),
            StatKind::Power => self.power_line(now),
        }
    }

    fn uptime_line(&mut self) -> LineText {
        let Ok(uptime) = self.probe.uptime() else {
            return unavailable("Up:");
        };
        let minutes = uptime.as_secs() / 60;
        let mut line = LineText::new();
        write!(line, "Up:{}h{}m", minutes / 60, minutes % 60).ok();
        line
    }

    fn ip_line(&mut self, now: Instant) -> LineText {
        let Self { probe, cache, .. } = self;
        let ip = cache.ip.get_or_refresh(now, || probe.ip_address());
        let mut line = LineText::new();
        write!(line, "IP:{}", ip.map_or(DEFAULT_IP, String::as_str)).ok();
        line
    }

    fn load_line(&mut self) -> LineText {
        let Ok(load) = self.probe.load_average() else {
            return unavailable("Load: ");
        };
        let mut line = LineText::new();
        write!(line, "Load: {load:.2}").ok();
        line
    }

    fn cpu_line(&mut self, now: Instant) -> LineText {
        let Self { probe, cache, cpu } = self;
        let Some(percent) = cache.cpu.get_or_refresh(now, || probe.cpu_times().map(|t| cpu.sample(t))) else {
            return unavailable("CPU: ");
        };
        let mut line = LineText::new();
        write!(line, "CPU: {percent:.1}%").ok();
        line
    }

    fn memory_line(&mut self) -> LineText {
        let Ok(mem) = self.probe.memory() else {
            return unavailable("Mem:");
        };
        let mut line = LineText::new();
        write!(
            line,
            "Mem:{}/{} {}%",
            bytes_to_human(mem.used()),
            bytes_to_human(mem.total),
            mem.percent() as u32
        )
        .ok();
        line
    }

    fn disk_line(&mut self, now: Instant) -> LineText {
        let Self { probe, cache, .. } = self;
        let Some(disk) = cache.disk.get_or_refresh(now, || probe.disk_usage()) else {
            return unavailable("Disk: ");
        };
        let mut line = LineText::new();
        write!(
            line,
            "Disk: {}/{} {}%",
            bytes_to_human(disk.used),
            bytes_to_human(disk.total),
            disk.percent() as u32
        )
        .ok();
        line
    }

    fn power_status(&mut self, now: Instant) -> Option<PowerStatus> {
        let Self { probe, cache, .. } = self;
        cache.power.get_or_refresh(now, || probe.power_status()).copied()
    }

    fn temperature_line(&mut self, now: Instant) -> LineText {
        let Some(temp) = self.power_status(now).and_then(|p| p.temperature_c) else {
            return unavailable("Temp: ");
        };
        let mut line = LineText::new();
        write!(line, "Temp: {temp:.1}C").ok();
        line
    }

    fn power_line(&mut self, now: Instant) -> LineText {
        let Some(status) = self.power_status(now) else {
            return unavailable("Pwr: ");
        };
        let (Some(current), Some(occurred)) = (status.current_flags(), status.occurred_flags()) else {
            return unavailable("Pwr: ");
        };

        let mut line = line_text("Pwr:");
        if current == 0 {
            line.push_str(" OK").ok();
            if occurred != 0 {
                line.push_str(" was").ok();
                push_flags(&mut line, occurred);
            }
        } else {
            push_flags(&mut line, current);
        }
        line
    }
}

/// Append a short tag for each set throttle condition.
fn push_flags(line: &mut LineText, flags: u32) {
    const TAGS: [(u32, &str); 4] = [
        (throttle::UNDER_VOLTAGE, " UV"),
        (throttle::FREQ_CAPPED, " CAP"),
        (throttle::THROTTLED, " THR"),
        (throttle::SOFT_TEMP_LIMIT, " TMP"),
    ];
    for (bit, tag) in TAGS {
        if flags & bit != 0 {
            line.push_str(tag).ok();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::probes::{DiskUsage, MemInfo, ProbeError};

    /// Scriptable probe: `None` fields fail with `Unavailable`. Counts calls.
    #[derive(Default)]
    pub(crate) struct FakeProbe {
        pub hostname: Option<String>,
        pub uptime: Option<Duration>,
        pub ip: Option<String>,
        pub load: Option<f32>,
        pub cpu: Option<CpuTimes>,
        pub memory: Option<MemInfo>,
        pub disk: Option<DiskUsage>,
        pub power: Option<PowerStatus>,
        pub ip_calls: u32,
        pub power_calls: u32,
    }

    impl FakeProbe {
        pub(crate) fn healthy() -> Self {
            Self {
                hostname: Some("raspberrypi".into()),
                uptime: Some(Duration::from_secs(26 * 3600 + 4 * 60 + 59)),
                ip: Some("192.168.1.20".into()),
                load: Some(0.42),
                cpu: Some(CpuTimes { idle: 750, total: 1000 }),
                memory: Some(MemInfo { total: 4 << 30, available: 3 << 30 }),
                disk: Some(DiskUsage { total: 32 << 30, used: 8 << 30 }),
                power: Some(PowerStatus { throttled: Some(0), temperature_c: Some(48.31) }),
                ..Self::default()
            }
        }
    }

    fn or_unavailable<T: Clone>(value: &Option<T>, what: &'static str) -> Result<T, ProbeError> {
        value.clone().ok_or(ProbeError::Unavailable(what))
    }

    impl SystemProbe for FakeProbe {
        fn hostname(&mut self) -> Result<String, ProbeError> { or_unavailable(&self.hostname, "host name") }

        fn uptime(&mut self) -> Result<Duration, ProbeError> { or_unavailable(&self.uptime, "uptime") }

        fn ip_address(&mut self) -> Result<String, ProbeError> {
            self.ip_calls += 1;
            or_unavailable(&self.ip, "ip")
        }

        fn load_average(&mut self) -> Result<f32, ProbeError> { or_unavailable(&self.load, "load") }

        fn cpu_times(&mut self) -> Result<CpuTimes, ProbeError> { or_unavailable(&self.cpu, "cpu") }

        fn memory(&mut self) -> Result<MemInfo, ProbeError> { or_unavailable(&self.memory, "memory") }

        fn disk_usage(&mut self) -> Result<DiskUsage, ProbeError> { or_unavailable(&self.disk, "disk") }

        fn power_status(&mut self) -> Result<PowerStatus, ProbeError> {
            self.power_calls += 1;
            or_unavailable(&self.power, "power")
        }
    }

    fn source(probe: FakeProbe) -> StatSource<FakeProbe> { StatSource::new(probe, ProbeCache::default()) }

    #[test]
    fn test_bytes_to_human() {
        assert_eq!(bytes_to_human(0).as_str(), "0B");
        assert_eq!(bytes_to_human(1023).as_str(), "1023B");
        assert_eq!(bytes_to_human(1024).as_str(), "1K");
        assert_eq!(bytes_to_human(412 * 1024 * 1024 + 1).as_str(), "412M");
        assert_eq!(bytes_to_human((3 << 30) + (900 << 20)).as_str(), "3G");
        assert_eq!(bytes_to_human(2 << 40).as_str(), "2T");
    }

    #[test]
    fn test_healthy_lines() {
        let now = Instant::now();
        let mut stats = source(FakeProbe::healthy());

        assert_eq!(stats.host_line(now).as_str(), "raspberrypi");
        assert_eq!(stats.stat_line(StatKind::Uptime, now).as_str(), "Up:26h4m");
        assert_eq!(stats.stat_line(StatKind::Ip, now).as_str(), "IP:192.168.1.20");
        assert_eq!(stats.stat_line(StatKind::Load, now).as_str(), "Load: 0.42");
        assert_eq!(stats.stat_line(StatKind::Cpu, now).as_str(), "CPU: 25.0%");
        assert_eq!(stats.stat_line(StatKind::Memory, now).as_str(), "Mem:1G/4G 25%");
        assert_eq!(stats.stat_line(StatKind::Disk, now).as_str(), "Disk: 8G/32G 25%");
        assert_eq!(stats.stat_line(StatKind::Temperature, now).as_str(), "Temp: 48.3C");
        assert_eq!(stats.stat_line(StatKind::Power, now).as_str(), "Pwr: OK");
    }

    #[test]
    fn test_failed_probes_degrade() {
        let now = Instant::now();
        let mut stats = source(FakeProbe::default());

        assert_eq!(stats.host_line(now).as_str(), "N/A");
        assert_eq!(stats.stat_line(StatKind::Uptime, now).as_str(), "Up:N/A");
        assert_eq!(stats.stat_line(StatKind::Ip, now).as_str(), "IP:0.0.0.0");
        assert_eq!(stats.stat_line(StatKind::Load, now).as_str(), "Load: N/A");
        assert_eq!(stats.stat_line(StatKind::Cpu, now).as_str(), "CPU: N/A");
        assert_eq!(stats.stat_line(StatKind::Memory, now).as_str(), "Mem:N/A");
        assert_eq!(stats.stat_line(StatKind::Disk, now).as_str(), "Disk: N/A");
        assert_eq!(stats.stat_line(StatKind::Temperature, now).as_str(), "Temp: N/A");
        assert_eq!(stats.stat_line(StatKind::Power, now).as_str(), "Pwr: N/A");
    }

    #[test]
    fn test_power_flags_line() {
        let now = Instant::now();
        let mut probe = FakeProbe::healthy();
        probe.power = Some(PowerStatus { throttled: Some(0x50005), temperature_c: Some(80.0) });
        assert_eq!(source(probe).stat_line(StatKind::Power, now).as_str(), "Pwr: UV THR");

        let mut probe = FakeProbe::healthy();
        probe.power = Some(PowerStatus { throttled: Some(0x10000), temperature_c: None });
        assert_eq!(source(probe).stat_line(StatKind::Power, now).as_str(), "Pwr: OK was UV");
    }

    #[test]
    fn test_power_batch_shared_with_temperature() {
        let now = Instant::now();
        let mut stats = source(FakeProbe::healthy());

        stats.stat_line(StatKind::Temperature, now);
        stats.stat_line(StatKind::Power, now);
        stats.stat_line(StatKind::Temperature, now + Duration::from_secs(1));

        assert_eq!(stats.probe().power_calls, 1, "One refresh serves both lines");
    }

    #[test]
    fn test_ip_cached_between_ticks() {
        let start = Instant::now();
        let mut stats = source(FakeProbe::healthy());

        for tick in 0..200 {
            stats.stat_line(StatKind::Ip, start + Duration::from_millis(tick * 50));
        }
        // 10 seconds of ticks against a 30 second TTL
        assert_eq!(stats.probe().ip_calls, 1);
    }

    #[test]
    fn test_cpu_sampler_deltas() {
        let mut sampler = CpuSampler::default();
        assert_eq!(sampler.sample(CpuTimes { idle: 900, total: 1000 }), 10.0);
        assert_eq!(sampler.sample(CpuTimes { idle: 950, total: 1100 }), 50.0);
        assert_eq!(sampler.sample(CpuTimes { idle: 950, total: 1100 }), 0.0, "No elapsed jiffies");
    }

    #[test]
    fn test_rotation_cycles() {
        let start = Instant::now();
        let interval = Duration::from_secs(10);
        let mut rotation = Rotation::new(&[StatKind::Cpu, StatKind::Memory], interval, start);

        assert_eq!(rotation.current(), StatKind::Cpu);
        assert!(!rotation.update(start + Duration::from_secs(9)));
        assert!(rotation.update(start + interval));
        assert_eq!(rotation.current(), StatKind::Memory);
        assert!(rotation.update(start + interval * 2));
        assert_eq!(rotation.current(), StatKind::Cpu, "Wraps to the first stat");
    }

    #[test]
    fn test_rotation_empty_uses_all() {
        let rotation = Rotation::new(&[], Duration::from_secs(1), Instant::now());
        assert_eq!(rotation.current(), StatKind::ALL[0]);
    }
}
