//! Recording configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{RecordingError, RecordingResult};

/// When a recorder writes a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPolicy {
    /// Write the current value on every interval tick
    FixedInterval,
    /// Write only when the value differs from the last recorded one
    OnValueChanged,
    /// Write on every update event, changed or not
    OnValueUpdate,
}

impl fmt::Display for RecordingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingPolicy::FixedInterval => write!(f, "fixed_interval"),
            RecordingPolicy::OnValueChanged => write!(f, "on_value_changed"),
            RecordingPolicy::OnValueUpdate => write!(f, "on_value_update"),
        }
    }
}

impl FromStr for RecordingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed_interval" | "interval" => Ok(RecordingPolicy::FixedInterval),
            "on_value_changed" | "changed" => Ok(RecordingPolicy::OnValueChanged),
            "on_value_update" | "update" => Ok(RecordingPolicy::OnValueUpdate),
            other => Err(format!("unknown recording policy '{}'", other)),
        }
    }
}

/// Recording policy plus its interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub policy: RecordingPolicy,
    /// Tick interval in milliseconds; only used by `FixedInterval`
    pub interval_ms: i64,
}

impl RecordingConfig {
    pub fn new(policy: RecordingPolicy, interval_ms: i64) -> Self {
        Self {
            policy,
            interval_ms,
        }
    }

    pub fn fixed_interval(interval_ms: i64) -> Self {
        Self::new(RecordingPolicy::FixedInterval, interval_ms)
    }

    pub fn on_value_changed() -> Self {
        Self::new(RecordingPolicy::OnValueChanged, 0)
    }

    pub fn on_value_update() -> Self {
        Self::new(RecordingPolicy::OnValueUpdate, 0)
    }

    pub fn validate(&self) -> RecordingResult<()> {
        if self.policy == RecordingPolicy::FixedInterval && self.interval_ms <= 0 {
            return Err(RecordingError::InvalidInterval(self.interval_ms));
        }
        Ok(())
    }
}
