//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::import::TimeUnit;
use crate::recording::{RecordingConfig, RecordingPolicy};
use crate::series::InterpolationMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub series: SeriesConfig,

    #[serde(default)]
    pub recording: RecordingDefaults,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults for newly created series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    #[serde(default = "default_interpolation")]
    pub default_interpolation: InterpolationMode,
}

fn default_interpolation() -> InterpolationMode {
    InterpolationMode::None
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            default_interpolation: default_interpolation(),
        }
    }
}

/// Default recording policy of the `record` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingDefaults {
    #[serde(default = "default_policy")]
    pub policy: RecordingPolicy,

    #[serde(default = "default_interval")]
    pub interval_ms: i64,
}

fn default_policy() -> RecordingPolicy {
    RecordingPolicy::OnValueChanged
}

fn default_interval() -> i64 {
    60_000 // 1 minute
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            interval_ms: default_interval(),
        }
    }
}

impl RecordingDefaults {
    pub fn to_config(&self) -> RecordingConfig {
        RecordingConfig::new(self.policy, self.interval_ms)
    }
}

/// CSV import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,

    #[serde(default = "default_has_header")]
    pub has_header: bool,

    #[serde(default)]
    pub timestamp_column: usize,

    #[serde(default = "default_value_column")]
    pub value_column: usize,

    /// strftime format; numeric timestamps when unset
    #[serde(default)]
    pub timestamp_format: Option<String>,

    #[serde(default = "default_time_unit")]
    pub time_unit: TimeUnit,
}

fn default_delimiter() -> char {
    ','
}

fn default_decimal_separator() -> char {
    '.'
}

fn default_has_header() -> bool {
    true
}

fn default_value_column() -> usize {
    1
}

fn default_time_unit() -> TimeUnit {
    TimeUnit::Milliseconds
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            decimal_separator: default_decimal_separator(),
            has_header: default_has_header(),
            timestamp_column: 0,
            value_column: default_value_column(),
            timestamp_format: None,
            time_unit: default_time_unit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("chronicle-schedule").join("config.toml")),
            Some(PathBuf::from("/etc/chronicle-schedule/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Series overrides
        if let Some(mode) = lookup("SCHEDULE_DEFAULT_INTERPOLATION") {
            match mode.parse() {
                Ok(m) => self.series.default_interpolation = m,
                Err(e) => tracing::warn!("Ignoring SCHEDULE_DEFAULT_INTERPOLATION: {}", e),
            }
        }

        // Recording overrides
        if let Some(policy) = lookup("SCHEDULE_RECORDING_POLICY") {
            match policy.parse() {
                Ok(p) => self.recording.policy = p,
                Err(e) => tracing::warn!("Ignoring SCHEDULE_RECORDING_POLICY: {}", e),
            }
        }
        if let Some(interval) = lookup("SCHEDULE_RECORDING_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.recording.interval_ms = ms;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("SCHEDULE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SCHEDULE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# chronicle-schedule configuration
#
# Environment variables override these settings:
# - SCHEDULE_DEFAULT_INTERPOLATION
# - SCHEDULE_RECORDING_POLICY
# - SCHEDULE_RECORDING_INTERVAL_MS
# - SCHEDULE_LOG_LEVEL
# - SCHEDULE_LOG_FORMAT

[series]
# Interpolation of new series: steps, linear, nearest or none
default_interpolation = "none"

[recording]
# Policy of the `record` command:
# fixed_interval, on_value_changed or on_value_update
policy = "on_value_changed"

# Tick interval for fixed_interval recording (ms)
interval_ms = 60000

[import]
# Field delimiter of CSV files
delimiter = ","

# Decimal separator of values
decimal_separator = "."

# Whether the first row holds column names
has_header = true

# Column indices (0-indexed)
timestamp_column = 0
value_column = 1

# strftime format of timestamps; numeric timestamps when unset
# timestamp_format = "%Y-%m-%d %H:%M:%S"

# Unit of numeric timestamps: milliseconds, seconds, minutes, hours
time_unit = "milliseconds"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/chronicle-schedule/schedule.log"
"#
    .to_string()
}
