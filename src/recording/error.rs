//! Recording error types

use thiserror::Error;

use crate::series::ValueKind;

/// Configuration errors reported by `Recorder::configure`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// The source's value kind cannot be recorded
    #[error("Cannot record values of kind {0}")]
    UnsupportedValueType(ValueKind),

    /// Source and target series disagree on the value kind
    #[error("Source kind {source_kind} does not match series kind {series_kind}")]
    KindMismatch {
        source_kind: ValueKind,
        series_kind: ValueKind,
    },

    /// Fixed-interval recording needs a positive interval
    #[error("Invalid recording interval: {0} ms")]
    InvalidInterval(i64),
}

/// Result type alias for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;
