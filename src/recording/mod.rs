//! Recorded data: turning a live value into time-series points
//!
//! ```text
//!  ValueSource ──value changed──> Recorder ──insert──> TimeSeries
//!                                    ^
//!  TimerScheduler ──tick────────────┘
//! ```
//!
//! A `Recorder` is driven entirely by delivered events; fixed-interval
//! ticks come from a caller-supplied `TimerScheduler`. `replay_samples`
//! applies a policy offline to historical samples.

pub mod config;
pub mod error;
pub mod recorder;
pub mod replay;
pub mod scheduler;
pub mod source;

pub use config::{RecordingConfig, RecordingPolicy};
pub use error::{RecordingError, RecordingResult};
pub use recorder::{Recorder, RecorderStats, RecordingEvent, RecordingObserver};
pub use replay::{replay_samples, Replay};
pub use scheduler::{ManualScheduler, TimerCallback, TimerId, TimerScheduler, TokioScheduler};
pub use source::{LiveValue, ValueSource};
