//! System probes.
//!
//! Each probe reads one piece of host state and returns a [`Result`]. Nothing
//! here retries or caches; [`crate::cache`] decides how often a probe runs and
//! [`crate::stats`] decides what to show when one fails.
//!
//! [`LinuxProbe`] reads `/proc` and `/sys` directly and shells out for the few
//! values that have no stable file interface:
//!
//! | Value        | Source                                   |
//! |--------------|------------------------------------------|
//! | host name    | `/proc/sys/kernel/hostname`              |
//! | uptime       | `/proc/uptime`                           |
//! | IP address   | `hostname -I`                            |
//! | load average | `/proc/loadavg`                          |
//! | CPU times    | `/proc/stat`                             |
//! | memory       | `/proc/meminfo`                          |
//! | disk         | `df -P -k /`                             |
//! | power        | `vcgencmd get_throttled` + thermal zone  |
//!
//! The parsers are separate pure functions so they can be tested on any host.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

// =============================================================================
// Errors
// =============================================================================

/// Why a probe produced no value.
#[derive(Debug)]
pub enum ProbeError {
    /// Reading a file or spawning a process failed.
    Io(std::io::Error),
    /// The command ran but exited unsuccessfully.
    CommandFailed { command: &'static str, status: Option<i32> },
    /// The source was readable but not in the expected format.
    Parse(&'static str),
    /// The value does not exist on this host.
    Unavailable(&'static str),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::CommandFailed { command, status: Some(code) } => write!(f, "`{command}` exited with {code}"),
            Self::CommandFailed { command, status: None } => write!(f, "`{command}` killed by signal"),
            Self::Parse(what) => write!(f, "cannot parse {what}"),
            Self::Unavailable(what) => write!(f, "{what} unavailable"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self { Self::Io(err) }
}

// =============================================================================
// Probe Values
// =============================================================================

/// Cumulative CPU jiffies from the aggregate `cpu` line of `/proc/stat`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CpuTimes {
    /// idle + iowait
    pub idle: u64,
    /// Sum of every column.
    pub total: u64,
}

/// Memory totals in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MemInfo {
    pub total: u64,
    pub available: u64,
}

impl MemInfo {
    pub const fn used(&self) -> u64 { self.total.saturating_sub(self.available) }

    /// Used share of total, 0-100.
    pub fn percent(&self) -> f32 { percent_of(self.used(), self.total) }
}

/// Root filesystem usage in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DiskUsage {
    pub total: u64,
    /// Space not available to unprivileged users (`total - available`).
    pub used: u64,
}

impl DiskUsage {
    /// Used share of total, 0-100.
    pub fn percent(&self) -> f32 { percent_of(self.used, self.total) }
}

/// Raspberry Pi firmware throttle flags plus SoC temperature.
///
/// Both come from the same refresh so the power line and the temperature line
/// never disagree about when they were sampled.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PowerStatus {
    /// Raw `get_throttled` bit field, `None` off a Raspberry Pi.
    pub throttled: Option<u32>,
    /// SoC temperature in degrees Celsius.
    pub temperature_c: Option<f32>,
}

/// Throttle bits as reported by `vcgencmd get_throttled`.
pub mod throttle {
    pub const UNDER_VOLTAGE: u32 = 1 << 0;
    pub const FREQ_CAPPED: u32 = 1 << 1;
    pub const THROTTLED: u32 = 1 << 2;
    pub const SOFT_TEMP_LIMIT: u32 = 1 << 3;
    /// Same four conditions, latched since boot.
    pub const OCCURRED_SHIFT: u32 = 16;
    pub const CURRENT_MASK: u32 = 0xF;
}

impl PowerStatus {
    /// Conditions active right now.
    pub fn current_flags(&self) -> Option<u32> { self.throttled.map(|t| t & throttle::CURRENT_MASK) }

    /// Conditions that have happened at any point since boot.
    pub fn occurred_flags(&self) -> Option<u32> {
        self.throttled.map(|t| (t >> throttle::OCCURRED_SHIFT) & throttle::CURRENT_MASK)
    }
}

fn percent_of(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 100.0 / total as f64) as f32
}

// =============================================================================
// Probe Trait
// =============================================================================

/// Source of host state for the stat lines.
pub trait SystemProbe {
    fn hostname(&mut self) -> Result<String, ProbeError>;
    fn uptime(&mut self) -> Result<Duration, ProbeError>;
    fn ip_address(&mut self) -> Result<String, ProbeError>;
    fn load_average(&mut self) -> Result<f32, ProbeError>;
    fn cpu_times(&mut self) -> Result<CpuTimes, ProbeError>;
    fn memory(&mut self) -> Result<MemInfo, ProbeError>;
    fn disk_usage(&mut self) -> Result<DiskUsage, ProbeError>;
    /// Throttle flags and temperature, fetched together.
    fn power_status(&mut self) -> Result<PowerStatus, ProbeError>;
}

// =============================================================================
// Linux Implementation
// =============================================================================

/// Probes backed by procfs, sysfs, and a few standard commands.
pub struct LinuxProbe {
    proc_root: PathBuf,
    thermal_zone: PathBuf,
}

impl LinuxProbe {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
        }
    }

    fn read_proc(&self, name: &str) -> Result<String, ProbeError> {
        Ok(std::fs::read_to_string(self.proc_root.join(name))?)
    }
}

impl Default for LinuxProbe {
    fn default() -> Self { Self::new() }
}

/// Run `command` and return its stdout, failing on a non-zero exit.
fn run(command: &'static str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(command).args(args).output()?;
    if !output.status.success() {
        return Err(ProbeError::CommandFailed { command, status: output.status.code() });
    }
    String::from_utf8(output.stdout).map_err(|_| ProbeError::Parse(command))
}

impl SystemProbe for LinuxProbe {
    fn hostname(&mut self) -> Result<String, ProbeError> {
        let name = self.read_proc("sys/kernel/hostname")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ProbeError::Unavailable("host name"));
        }
        Ok(name.to_owned())
    }

    fn uptime(&mut self) -> Result<Duration, ProbeError> { parse_uptime(&self.read_proc("uptime")?) }

    fn ip_address(&mut self) -> Result<String, ProbeError> { parse_hostname_i(&run("hostname", &["-I"])?) }

    fn load_average(&mut self) -> Result<f32, ProbeError> { parse_loadavg(&self.read_proc("loadavg")?) }

    fn cpu_times(&mut self) -> Result<CpuTimes, ProbeError> { parse_cpu_times(&self.read_proc("stat")?) }

    fn memory(&mut self) -> Result<MemInfo, ProbeError> { parse_meminfo(&self.read_proc("meminfo")?) }

    fn disk_usage(&mut self) -> Result<DiskUsage, ProbeError> { parse_df(&run("df", &["-P", "-k", "/"])?) }

    fn power_status(&mut self) -> Result<PowerStatus, ProbeError> {
        let throttled = run("vcgencmd", &["get_throttled"]).and_then(|out| parse_throttled(&out));
        let temperature = std::fs::read_to_string(&self.thermal_zone)
            .map_err(ProbeError::from)
            .and_then(|out| parse_thermal(&out));

        match (throttled, temperature) {
            (Err(err), Err(_)) => Err(err),
            (throttled, temperature) => Ok(PowerStatus { throttled: throttled.ok(), temperature_c: temperature.ok() }),
        }
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// KiB count to bytes, `None` on overflow.
fn kib_to_bytes(kib: u64) -> Option<u64> { kib.checked_mul(1024) }

/// `/proc/uptime`: "12345.67 54321.00"
pub fn parse_uptime(text: &str) -> Result<Duration, ProbeError> {
    text.split_whitespace()
        .next()
        .and_then(|secs| secs.parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or(ProbeError::Parse("uptime"))
}

/// `hostname -I`: space-separated addresses, first one wins.
pub fn parse_hostname_i(text: &str) -> Result<String, ProbeError> {
    text.split_whitespace().next().map(str::to_owned).ok_or(ProbeError::Unavailable("IP address"))
}

/// `/proc/loadavg`: "0.42 0.35 0.30 1/123 4567" -> 1-minute load.
pub fn parse_loadavg(text: &str) -> Result<f32, ProbeError> {
    text.split_whitespace().next().and_then(|v| v.parse().ok()).ok_or(ProbeError::Parse("loadavg"))
}

/// Aggregate `cpu` line of `/proc/stat`.
pub fn parse_cpu_times(text: &str) -> Result<CpuTimes, ProbeError> {
    let line = text
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or(ProbeError::Parse("/proc/stat"))?;

    let columns = line
        .split_whitespace()
        .skip(1)
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ProbeError::Parse("/proc/stat"))?;
    if columns.len() < 4 {
        return Err(ProbeError::Parse("/proc/stat"));
    }

    // user nice system idle iowait irq softirq steal ...
    let idle = columns[3].checked_add(columns.get(4).copied().unwrap_or(0));
    let total = columns.iter().try_fold(0u64, |sum, &v| sum.checked_add(v));
    match (idle, total) {
        (Some(idle), Some(total)) => Ok(CpuTimes { idle, total }),
        _ => Err(ProbeError::Parse("/proc/stat")),
    }
}

/// `/proc/meminfo` MemTotal and MemAvailable (kB) in bytes.
pub fn parse_meminfo(text: &str) -> Result<MemInfo, ProbeError> {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .and_then(kib_to_bytes)
    };

    let total = field("MemTotal").ok_or(ProbeError::Parse("MemTotal"))?;
    let available = field("MemAvailable").ok_or(ProbeError::Parse("MemAvailable"))?;
    Ok(MemInfo { total, available })
}

/// `df -P -k /`: header line, then "fs 1024-blocks used available capacity mount".
pub fn parse_df(text: &str) -> Result<DiskUsage, ProbeError> {
    let row = text.lines().nth(1).ok_or(ProbeError::Parse("df"))?;
    let columns: Vec<&str> = row.split_whitespace().collect();
    let column = |i: usize| {
        columns
            .get(i)
            .and_then(|v| v.parse::<u64>().ok())
            .and_then(kib_to_bytes)
            .ok_or(ProbeError::Parse("df"))
    };

    let total = column(1)?;
    let available = column(3)?;
    Ok(DiskUsage { total, used: total.saturating_sub(available) })
}

/// `vcgencmd get_throttled`: "throttled=0x50005"
pub fn parse_throttled(text: &str) -> Result<u32, ProbeError> {
    text.trim()
        .strip_prefix("throttled=")
        .map(|hex| hex.trim_start_matches("0x"))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .ok_or(ProbeError::Parse("get_throttled"))
}

/// Thermal zone millidegrees: "48312" -> 48.312
pub fn parse_thermal(text: &str) -> Result<f32, ProbeError> {
    text.trim()
        .parse::<i64>()
        .map(|milli| milli as f32 / 1000.0)
        .map_err(|_| ProbeError::Parse("thermal zone"))
}

// =============================================================================
// Tests
// =============================================================================
