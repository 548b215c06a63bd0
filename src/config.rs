//! Display, timing, and cache configuration.
//!
//! Every tunable has a compile-time default defined as a `const` below. At startup
//! the binary may override any of them from a TOML file (see [`Settings::load`]);
//! after that the values are fixed for the lifetime of the process.
//!
//! # Example file
//!
//! ```toml
//! [display]
//! width = 128
//! height = 32
//!
//! [scroll]
//! speed_px = 4
//! tick_ms = 50
//!
//! [cache]
//! cpu_secs = 0.5
//! ip_secs = 30.0
//!
//! [burn_in]
//! lines = [true, true]
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::stats::StatKind;

// =============================================================================
// Display Configuration
// =============================================================================

/// Display width in pixels (SSD1306 128x32 panel).
pub const SCREEN_WIDTH: u32 = 128;

/// Display height in pixels.
pub const SCREEN_HEIGHT: u32 = 32;

/// Number of text lines on the display.
pub const LINE_COUNT: usize = 2;

/// Top edge of each line, in pixels.
pub const LINE_Y: [i32; LINE_COUNT] = [0, 16];

/// ProFont point size for each line. 12pt glyphs are 15px tall and fit a 16px row.
pub const FONT_POINTS: [u32; LINE_COUNT] = [12, 12];

// =============================================================================
// Timing Configuration
// =============================================================================

/// Render tick (~20 FPS). The main loop sleeps for whatever is left of it.
pub const FRAME_TIME: Duration = Duration::from_millis(50);

/// How long each stat stays on the second line before rotating.
pub const ROTATE_INTERVAL: Duration = Duration::from_secs(10);

/// Pixels a scrolling line moves per tick.
pub const SCROLL_SPEED_PX: i32 = 4;

/// Gap between repeated copies of a scrolling line.
pub const SCROLL_GAP_PX: i32 = 24;

// =============================================================================
// Probe Cache TTLs
// =============================================================================

/// CPU usage is cheap to read but noisy; refresh a couple of times per second.
pub const CPU_TTL: Duration = Duration::from_millis(500);

/// Throttle flags and SoC temperature (one `vcgencmd` call per refresh).
pub const POWER_TTL: Duration = Duration::from_secs(5);

/// Disk usage (`df` process per refresh).
pub const DISK_TTL: Duration = Duration::from_secs(30);

/// Primary IP address (`hostname -I` process per refresh).
pub const IP_TTL: Duration = Duration::from_secs(30);

/// Host name. Effectively constant.
pub const HOST_TTL: Duration = Duration::from_secs(60);

// =============================================================================
// Burn-in Mitigation
// =============================================================================

/// Largest horizontal burn-in shift in pixels.
pub const BURN_IN_MAX_X: u32 = 2;

/// Largest vertical burn-in shift in pixels.
pub const BURN_IN_MAX_Y: u32 = 1;

/// Time between burn-in shifts.
pub const BURN_IN_INTERVAL: Duration = Duration::from_secs(60);

/// Which lines follow the burn-in offset. The host name line is the static one.
pub const BURN_IN_LINES: [bool; LINE_COUNT] = [true, false];

// =============================================================================
// Config File Location
// =============================================================================

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "STATUS_OLED_CONFIG";

/// Settings file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/status-oled.toml";

// =============================================================================
// Errors
// =============================================================================

/// Failure to load startup settings.
#[derive(Debug)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    Io(std::io::Error),
    /// The settings file is not valid TOML for [`Settings`].
    Parse(toml::de::Error),
    /// A value is out of range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read settings: {err}"),
            Self::Parse(err) => write!(f, "malformed settings: {err}"),
            Self::Invalid(what) => write!(f, "invalid setting: {what}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Panel geometry and per-line fonts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
    pub line_y: [i32; LINE_COUNT],
    pub font_points: [u32; LINE_COUNT],
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            line_y: LINE_Y,
            font_points: FONT_POINTS,
        }
    }
}

/// Marquee motion and render cadence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrollSettings {
    pub speed_px: i32,
    pub gap_px: i32,
    pub tick_ms: u64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            speed_px: SCROLL_SPEED_PX,
            gap_px: SCROLL_GAP_PX,
            tick_ms: FRAME_TIME.as_millis() as u64,
        }
    }
}

/// Second-line stat rotation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotationSettings {
    pub interval_secs: f64,
    pub stats: Vec<StatKind>,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            interval_secs: ROTATE_INTERVAL.as_secs_f64(),
            stats: StatKind::ALL.to_vec(),
        }
    }
}

/// Time-to-live for each probe family, in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub cpu_secs: f64,
    pub power_secs: f64,
    pub disk_secs: f64,
    pub ip_secs: f64,
    pub host_secs: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cpu_secs: CPU_TTL.as_secs_f64(),
            power_secs: POWER_TTL.as_secs_f64(),
            disk_secs: DISK_TTL.as_secs_f64(),
            ip_secs: IP_TTL.as_secs_f64(),
            host_secs: HOST_TTL.as_secs_f64(),
        }
    }
}

impl CacheSettings {
    pub fn cpu_ttl(&self) -> Duration { secs(self.cpu_secs) }

    pub fn power_ttl(&self) -> Duration { secs(self.power_secs) }

    pub fn disk_ttl(&self) -> Duration { secs(self.disk_secs) }

    pub fn ip_ttl(&self) -> Duration { secs(self.ip_secs) }

    pub fn host_ttl(&self) -> Duration { secs(self.host_secs) }
}

/// Burn-in offset range, cadence, and participating lines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BurnInSettings {
    pub max_x: u32,
    pub max_y: u32,
    pub interval_secs: f64,
    pub lines: [bool; LINE_COUNT],
}

impl Default for BurnInSettings {
    fn default() -> Self {
        Self {
            max_x: BURN_IN_MAX_X,
            max_y: BURN_IN_MAX_Y,
            interval_secs: BURN_IN_INTERVAL.as_secs_f64(),
            lines: BURN_IN_LINES,
        }
    }
}

/// All startup-time settings. Missing sections and keys fall back to the consts above.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub display: DisplaySettings,
    pub scroll: ScrollSettings,
    pub rotation: RotationSettings,
    pub cache: CacheSettings,
    pub burn_in: BurnInSettings,
}

impl Settings {
    /// Load settings from the file named by [`CONFIG_ENV`], or [`DEFAULT_CONFIG_PATH`].
    ///
    /// A missing file is not an error: the compiled-in defaults are used.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::load_from(Path::new(&path))
    }

    /// Load settings from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading settings");
                Self::from_toml_str(&contents)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the render loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid("display dimensions must be non-zero"));
        }
        if self.scroll.tick_ms == 0 {
            return Err(ConfigError::Invalid("scroll.tick_ms must be non-zero"));
        }
        if self.scroll.speed_px <= 0 {
            return Err(ConfigError::Invalid("scroll.speed_px must be positive"));
        }
        if self.scroll.gap_px < 0 {
            return Err(ConfigError::Invalid("scroll.gap_px must not be negative"));
        }
        if self.burn_in.max_x >= self.display.width || self.burn_in.max_y >= self.display.height {
            return Err(ConfigError::Invalid("burn_in.max_x/max_y must be smaller than the display"));
        }
        if self.rotation.stats.is_empty() {
            return Err(ConfigError::Invalid("rotation.stats must name at least one stat"));
        }
        let durations = [
            self.rotation.interval_secs,
            self.cache.cpu_secs,
            self.cache.power_secs,
            self.cache.disk_secs,
            self.cache.ip_secs,
            self.cache.host_secs,
            self.burn_in.interval_secs,
        ];
        if durations.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ConfigError::Invalid("durations must be finite and non-negative"));
        }
        Ok(())
    }

    /// Render tick duration.
    pub fn tick(&self) -> Duration { Duration::from_millis(self.scroll.tick_ms) }

    /// Stat rotation interval.
    pub fn rotation_interval(&self) -> Duration { secs(self.rotation.interval_secs) }

    /// Burn-in shift interval.
    pub fn burn_in_interval(&self) -> Duration { secs(self.burn_in.interval_secs) }
}

/// Seconds to `Duration`; out-of-range values (already rejected by `validate`) become zero.
fn secs(value: f64) -> Duration { Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO) }

// =============================================================================
// Tests
// =============================================================================
