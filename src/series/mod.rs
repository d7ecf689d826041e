//! Time-series engine
//!
//! # Architecture
//!
//! ```text
//!  TimeSeries::insert/replace/delete
//!            |
//!            v
//!  ┌───────────────────┐   Arc clone   ┌───────────────────┐
//!  │ Schedule          │ ────────────> │ SeriesSnapshot    │
//!  │ RwLock<state>     │               │ value_at / range  │
//!  │ Arc<PointStore>   │               │ reduced_range     │
//!  └───────────────────┘               │ iter              │
//!                                      └───────────────────┘
//! ```
//!
//! - **store**: ordered point map and the half-open range mutations
//! - **interpolation**: values between stored points
//! - **reduction**: bucketed aggregates
//! - **snapshot**: the query engine over one consistent view
//! - **schedule**: the concrete series with locking and access control
//! - **analysis**: integral, average and extremes
//! - **combine**: sums and averages across several series

pub mod analysis;
pub mod combine;
pub mod error;
pub mod interpolation;
pub mod lock;
pub mod reduction;
pub mod schedule;
pub mod snapshot;
pub mod store;
pub mod traits;
pub mod types;

pub use combine::CombineOptions;
pub use error::{SeriesError, SeriesResult};
pub use lock::{TreeLock, TreeReadGuard, TreeWriteGuard};
pub use schedule::{Schedule, SeriesAccess};
pub use snapshot::{PointIter, SeriesSnapshot};
pub use store::PointStore;
pub use traits::{EmptyTimeSeries, ReadOnlyTimeSeries, TimeSeries, EMPTY_SERIES};
pub use types::{
    InterpolationMode, Quality, ReductionMode, SampledPoint, TimeRange, Value, ValueKind,
};
