//! # chronicle-schedule
//!
//! Schedules and recorded data: an in-memory time-series engine for sensor
//! histories and actuator forecasts.
//!
//! ## Features
//!
//! - **Interpolated queries**: steps, linear, nearest or none between points
//! - **Range mutations**: insert / replace / delete over half-open intervals
//! - **Snapshot reads**: readers never see a half-applied batch
//! - **Recording**: fixed-interval, on-change and on-update policies
//! - **Reductions**: bucketed average / min / max
//!
//! ## Modules
//!
//! - [`series`]: point store, query engine and the `Schedule` facade
//! - [`recording`]: recording policy state machine and timer schedulers
//! - [`import`]: CSV import
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use chronicle_schedule::series::*;
//!
//! let schedule = Schedule::new("temperature", ValueKind::Double)
//!     .with_interpolation_mode(InterpolationMode::Linear)?;
//!
//! schedule.insert_many(
//!     vec![
//!         SampledPoint::good(1_000, Value::Double(20.0)),
//!         SampledPoint::good(3_000, Value::Double(22.0)),
//!     ],
//!     None,
//! );
//!
//! let point = schedule.value_at(2_000).unwrap();
//! assert_eq!(point.value, Value::Double(21.0));
//! # Ok::<(), SeriesError>(())
//! ```

pub mod config;
pub mod import;
pub mod recording;
pub mod series;

// Re-export top-level types for convenience
pub use series::{
    EmptyTimeSeries, InterpolationMode, Quality, ReadOnlyTimeSeries, ReductionMode, SampledPoint,
    Schedule, SeriesAccess, SeriesError, SeriesResult, TimeSeries, Value, ValueKind, EMPTY_SERIES,
};

pub use recording::{
    LiveValue, ManualScheduler, Recorder, RecorderStats, RecordingConfig, RecordingError,
    RecordingEvent, RecordingObserver, RecordingPolicy, Replay, TimerScheduler, TokioScheduler,
    ValueSource,
};

pub use import::{CsvImportResult, CsvImporter, ImportError, TimeUnit};

pub use config::{Config, ConfigError, LoggingConfig};
