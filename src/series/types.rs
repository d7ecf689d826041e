//! Core data types for schedules and recorded data
//!
//! This module defines the fundamental types used throughout the series layer:
//! - `Value` / `ValueKind`: the tagged value union and its kind
//! - `Quality`: trust marker carried by every point
//! - `SampledPoint`: a single (timestamp, value, quality) observation
//! - `TimeRange`: a half-open time interval
//! - `InterpolationMode` and `ReductionMode`: query policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

/// Kind of value a series holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Object,
}

impl ValueKind {
    /// Numeric kinds support linear interpolation and numeric reductions.
    ///
    /// Booleans are deliberately excluded.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueKind::Integer | ValueKind::Long | ValueKind::Float | ValueKind::Double
        )
    }

    /// Kinds a live value source can be recorded from
    pub fn is_recordable(&self) -> bool {
        self.is_numeric() || *self == ValueKind::Boolean
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Bytes => "bytes",
            ValueKind::String => "string",
            ValueKind::Object => "object",
        };
        write!(f, "{}", name)
    }
}

/// A value stored in a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Object(serde_json::Value),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Numeric view of the value; `None` for non-numeric kinds
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Structural equality used for change detection.
    ///
    /// Floating point values compare by bit pattern, so `NaN` equals `NaN`
    /// and `0.0` differs from `-0.0`.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::String(v) => write!(f, "{}", v),
            Value::Object(v) => write!(f, "{}", v),
        }
    }
}

/// Quality tag of a sampled point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Trustworthy measurement or forecast
    Good,
    /// Gap or fault marker
    Bad,
}

impl Quality {
    pub fn is_good(&self) -> bool {
        *self == Quality::Good
    }

    /// `Good` only if both inputs are `Good`
    pub fn combine(self, other: Quality) -> Quality {
        if self.is_good() && other.is_good() {
            Quality::Good
        } else {
            Quality::Bad
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => write!(f, "good"),
            Quality::Bad => write!(f, "bad"),
        }
    }
}

/// A single time-series observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledPoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub value: Value,
    pub quality: Quality,
}

impl SampledPoint {
    pub fn new(timestamp: i64, value: Value, quality: Quality) -> Self {
        Self {
            timestamp,
            value,
            quality,
        }
    }

    /// Create a point with `Good` quality
    pub fn good(timestamp: i64, value: Value) -> Self {
        Self::new(timestamp, value, Quality::Good)
    }

    /// Create a point with `Bad` quality
    pub fn bad(timestamp: i64, value: Value) -> Self {
        Self::new(timestamp, value, Quality::Bad)
    }

    /// Copy of this point moved to another timestamp
    pub fn restamped(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            value: self.value.clone(),
            quality: self.quality,
        }
    }

    pub fn is_good(&self) -> bool {
        self.quality.is_good()
    }
}

/// Time range for queries and mutations (half-open interval: [start, end))
///
/// An `end` of `i64::MAX` is treated as unbounded, so `TimeRange::ALL`
/// covers every representable timestamp. `[i64::MAX, i64::MAX)` stays empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    pub const ALL: TimeRange = TimeRange {
        start: i64::MIN,
        end: i64::MAX,
    };

    /// Create a new time range; `start >= end` yields an empty range
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Range starting at `start` without upper bound
    pub fn starting_at(start: i64) -> Self {
        Self {
            start,
            end: i64::MAX,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `[start, i64::MAX)` with `start < i64::MAX`; includes `i64::MAX` itself
    pub fn is_unbounded(&self) -> bool {
        self.end == i64::MAX && self.start < self.end
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && (timestamp < self.end || self.is_unbounded())
    }

    /// Bounds usable with `BTreeMap::range`; only valid for non-empty ranges
    pub fn bounds(&self) -> (Bound<i64>, Bound<i64>) {
        let upper = if self.is_unbounded() {
            Bound::Unbounded
        } else {
            Bound::Excluded(self.end)
        };
        (Bound::Included(self.start), upper)
    }
}

/// Policy for deriving a value at a timestamp with no stored point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Previous value holds until the next point
    Steps,
    /// Straight line between neighbouring points
    Linear,
    /// Value of the closer neighbour
    Nearest,
    /// Only stored points are defined
    None,
}

impl InterpolationMode {
    pub fn all() -> &'static [InterpolationMode] {
        &[
            InterpolationMode::Steps,
            InterpolationMode::Linear,
            InterpolationMode::Nearest,
            InterpolationMode::None,
        ]
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationMode::Steps => write!(f, "steps"),
            InterpolationMode::Linear => write!(f, "linear"),
            InterpolationMode::Nearest => write!(f, "nearest"),
            InterpolationMode::None => write!(f, "none"),
        }
    }
}

impl FromStr for InterpolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "steps" | "step" => Ok(InterpolationMode::Steps),
            "linear" => Ok(InterpolationMode::Linear),
            "nearest" => Ok(InterpolationMode::Nearest),
            "none" => Ok(InterpolationMode::None),
            other => Err(format!(
                "unknown interpolation mode '{}': use steps, linear, nearest or none",
                other
            )),
        }
    }
}

/// How stored points are aggregated into fixed-width buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMode {
    /// Return the good points unchanged
    None,
    /// Arithmetic mean per bucket
    Average,
    /// Smallest value per bucket
    Minimum,
    /// Largest value per bucket
    Maximum,
    /// Minimum followed by maximum per bucket
    MinMax,
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMode::None => write!(f, "none"),
            ReductionMode::Average => write!(f, "average"),
            ReductionMode::Minimum => write!(f, "minimum"),
            ReductionMode::Maximum => write!(f, "maximum"),
            ReductionMode::MinMax => write!(f, "min_max"),
        }
    }
}

impl FromStr for ReductionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ReductionMode::None),
            "avg" | "average" => Ok(ReductionMode::Average),
            "min" | "minimum" => Ok(ReductionMode::Minimum),
            "max" | "maximum" => Ok(ReductionMode::Maximum),
            "minmax" | "min_max" => Ok(ReductionMode::MinMax),
            other => Err(format!(
                "unknown reduction '{}': use none, avg, min, max or minmax",
                other
            )),
        }
    }
}
