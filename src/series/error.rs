//! Series error types
//!
//! Query misses and rejected writes are not errors; these cover invalid
//! requests that a caller must fix.

use thiserror::Error;

use super::types::{InterpolationMode, ValueKind};

/// Errors raised by series queries and configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    /// Bucket width not positive or start after end
    #[error("Invalid interval: start={start}, end={end}, width={width}")]
    InvalidInterval { start: i64, end: i64, width: i64 },

    /// Numeric operation requested on a non-numeric series
    #[error("Series of kind {0} is not numeric")]
    NotNumeric(ValueKind),

    /// Interpolation mode cannot be applied to this kind
    #[error("Interpolation mode {mode} not supported for kind {kind}")]
    NotInterpolable {
        kind: ValueKind,
        mode: InterpolationMode,
    },

    /// Reduction would emit more buckets than allowed
    #[error("Reduction would produce {requested} buckets (limit {limit})")]
    TooManyBuckets { requested: u128, limit: u128 },
}

/// Result type alias for series operations
pub type SeriesResult<T> = Result<T, SeriesError>;
