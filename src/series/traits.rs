//! Read-only and mutable series contracts
//!
//! Every query is answered from a single `SeriesSnapshot`, so implementors
//! only provide `snapshot()` plus the mutations.

use tracing::warn;

use super::error::SeriesResult;
use super::snapshot::{PointIter, SeriesSnapshot};
use super::types::{InterpolationMode, Quality, ReductionMode, SampledPoint, Value, ValueKind};

/// Query side of a time series
pub trait ReadOnlyTimeSeries: Send + Sync {
    /// Consistent view of the current points and settings
    fn snapshot(&self) -> SeriesSnapshot;

    fn value_kind(&self) -> Option<ValueKind> {
        self.snapshot().value_kind()
    }

    fn interpolation_mode(&self) -> InterpolationMode {
        self.snapshot().interpolation_mode()
    }

    fn last_calculation_time(&self) -> Option<i64> {
        self.snapshot().last_calculation_time()
    }

    fn value_at(&self, t: i64) -> Option<SampledPoint> {
        self.snapshot().value_at(t)
    }

    fn value_at_or_bad(&self, t: i64) -> SampledPoint {
        self.snapshot().value_at_or_bad(t)
    }

    fn next_at_or_after(&self, t: i64) -> Option<SampledPoint> {
        self.snapshot().next_at_or_after(t)
    }

    fn previous_at_or_before(&self, t: i64) -> Option<SampledPoint> {
        self.snapshot().previous_at_or_before(t)
    }

    fn range(&self, start: i64, end: i64) -> Vec<SampledPoint> {
        self.snapshot().range(start, end)
    }

    fn values_from(&self, start: i64) -> Vec<SampledPoint> {
        self.snapshot().values_from(start)
    }

    fn values_with_boundaries(&self, start: i64, end: i64) -> Vec<SampledPoint> {
        self.snapshot().values_with_boundaries(start, end)
    }

    fn reduced_range(
        &self,
        start: i64,
        end: i64,
        bucket_width: i64,
        mode: ReductionMode,
    ) -> SeriesResult<Vec<SampledPoint>> {
        self.snapshot()
            .reduced_range(start, end, bucket_width, mode)
    }

    fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn is_empty_in(&self, start: i64, end: i64) -> bool {
        self.snapshot().is_empty_in(start, end)
    }

    fn size(&self) -> usize {
        self.snapshot().size()
    }

    fn size_in(&self, start: i64, end: i64) -> usize {
        self.snapshot().size_in(start, end)
    }

    fn iter(&self) -> PointIter {
        self.snapshot().iter()
    }

    fn iter_range(&self, start: i64, end: i64) -> PointIter {
        self.snapshot().iter_range(start, end)
    }
}

/// Mutation side of a time series.
///
/// Mutations return `false` when the write is rejected. `calculated_at`, when
/// given, replaces the series' last calculation time.
pub trait TimeSeries: ReadOnlyTimeSeries {
    /// Insert points atomically, overwriting equal timestamps
    fn insert_many(&self, points: Vec<SampledPoint>, calculated_at: Option<i64>) -> bool;

    /// Remove `[start, end)`
    fn delete(&self, start: i64, end: i64, calculated_at: Option<i64>) -> bool;

    /// Atomically delete `[start, end)` and insert the points inside it
    fn replace(
        &self,
        start: i64,
        end: i64,
        points: Vec<SampledPoint>,
        calculated_at: Option<i64>,
    ) -> bool;

    /// Remove every point before `end`
    fn delete_before(&self, end: i64, calculated_at: Option<i64>) -> bool;

    /// Move every point by `delta` milliseconds
    fn shift_timestamps(&self, delta: i64) -> bool;

    fn set_interpolation_mode(&self, mode: InterpolationMode) -> SeriesResult<()>;

    fn insert(&self, point: SampledPoint, calculated_at: Option<i64>) -> bool {
        self.insert_many(vec![point], calculated_at)
    }

    fn delete_all(&self) -> bool {
        self.delete(i64::MIN, i64::MAX, None)
    }

    /// Replace `[start, start + len * step)` with good points at
    /// `start + k * step`
    fn replace_fixed_step(
        &self,
        start: i64,
        values: Vec<Value>,
        step: i64,
        calculated_at: Option<i64>,
    ) -> bool {
        if step <= 0 {
            warn!("Rejecting fixed-step replace with step {}", step);
            return false;
        }
        let end = start as i128 + step as i128 * values.len() as i128;
        let end = end.min(i64::MAX as i128) as i64;

        let points = values
            .into_iter()
            .enumerate()
            .map_while(|(k, value)| {
                let t = start as i128 + step as i128 * k as i128;
                (t < end as i128).then(|| SampledPoint::new(t as i64, value, Quality::Good))
            })
            .collect();
        self.replace(start, end, points, calculated_at)
    }

    /// Replace `[start, end)` with the other series' points of that range
    /// and adopt its interpolation mode
    fn copy_from(&self, other: &dyn ReadOnlyTimeSeries, start: i64, end: i64) -> bool {
        let source = other.snapshot();
        if !self.replace(start, end, source.range(start, end), None) {
            return false;
        }
        match self.set_interpolation_mode(source.interpolation_mode()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Copied points but kept interpolation mode: {}", e);
                false
            }
        }
    }
}

/// The series with no points. Shared, stateless and always `None` mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTimeSeries;

/// Shared empty read-only series
pub static EMPTY_SERIES: EmptyTimeSeries = EmptyTimeSeries;

impl ReadOnlyTimeSeries for EmptyTimeSeries {
    fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot::empty()
    }

    fn value_at(&self, _t: i64) -> Option<SampledPoint> {
        None
    }

    fn range(&self, _start: i64, _end: i64) -> Vec<SampledPoint> {
        Vec::new()
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn size(&self) -> usize {
        0
    }
}
