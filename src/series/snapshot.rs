//! Point-in-time view of a series and the query engine over it
//!
//! A snapshot shares the point store through an `Arc`. Writers copy the
//! store on the next mutation, so a snapshot never observes a partially
//! applied `insert_many` or `replace`.

use std::sync::{Arc, OnceLock};

use super::error::{SeriesError, SeriesResult};
use super::interpolation::{bad_point, interpolate};
use super::reduction::reduce;
use super::store::PointStore;
use super::types::{InterpolationMode, ReductionMode, SampledPoint, TimeRange, ValueKind};

fn shared_empty_store() -> Arc<PointStore> {
    static EMPTY: OnceLock<Arc<PointStore>> = OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::new(PointStore::new())))
}

/// Immutable view of a series' points and settings
#[derive(Debug, Clone)]
pub struct SeriesSnapshot {
    points: Arc<PointStore>,
    mode: InterpolationMode,
    last_calculation: Option<i64>,
    value_kind: Option<ValueKind>,
}

impl SeriesSnapshot {
    pub fn new(
        points: Arc<PointStore>,
        mode: InterpolationMode,
        last_calculation: Option<i64>,
        value_kind: Option<ValueKind>,
    ) -> Self {
        Self {
            points,
            mode,
            last_calculation,
            value_kind,
        }
    }

    /// Snapshot of a series that has never held a point
    pub fn empty() -> Self {
        Self::new(shared_empty_store(), InterpolationMode::None, None, None)
    }

    pub fn interpolation_mode(&self) -> InterpolationMode {
        self.mode
    }

    pub fn last_calculation_time(&self) -> Option<i64> {
        self.last_calculation
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        self.value_kind
    }

    pub fn store(&self) -> &PointStore {
        &self.points
    }

    /// Value at `t`: the stored point on an exact hit, else interpolated
    pub fn value_at(&self, t: i64) -> Option<SampledPoint> {
        if let Some(point) = self.points.get(t) {
            return Some(point.clone());
        }
        if self.mode == InterpolationMode::None {
            return None;
        }
        interpolate(self.mode, self.points.before(t), self.points.after(t), t)
    }

    /// Like `value_at`, but a bad `NaN` point instead of a miss
    pub fn value_at_or_bad(&self, t: i64) -> SampledPoint {
        self.value_at(t).unwrap_or_else(|| bad_point(t))
    }

    pub fn next_at_or_after(&self, t: i64) -> Option<SampledPoint> {
        self.points.ceiling(t).cloned()
    }

    pub fn previous_at_or_before(&self, t: i64) -> Option<SampledPoint> {
        self.points.floor(t).cloned()
    }

    /// Stored points of `[start, end)` in time order
    pub fn range(&self, start: i64, end: i64) -> Vec<SampledPoint> {
        self.points
            .range(TimeRange::new(start, end))
            .cloned()
            .collect()
    }

    pub fn values_from(&self, start: i64) -> Vec<SampledPoint> {
        self.points.range(TimeRange::starting_at(start)).cloned().collect()
    }

    /// Stored points of `[start, end]` framed by the values at both ends.
    ///
    /// Boundary points come from `value_at_or_bad` unless a stored point
    /// already sits there.
    pub fn values_with_boundaries(&self, start: i64, end: i64) -> Vec<SampledPoint> {
        if start > end {
            return Vec::new();
        }
        let mut values: Vec<SampledPoint> = self
            .points
            .range(TimeRange::new(start, end))
            .cloned()
            .collect();

        if values.first().map(|p| p.timestamp) != Some(start) {
            values.insert(0, self.value_at_or_bad(start));
        }
        if start != end && values.last().map(|p| p.timestamp) != Some(end) {
            values.push(self.value_at_or_bad(end));
        }
        values
    }

    /// Aggregate `[start, end)` into fixed-width buckets
    pub fn reduced_range(
        &self,
        start: i64,
        end: i64,
        bucket_width: i64,
        mode: ReductionMode,
    ) -> SeriesResult<Vec<SampledPoint>> {
        if mode != ReductionMode::None {
            if let Some(kind) = self.value_kind.filter(|k| !k.is_numeric()) {
                return Err(SeriesError::NotNumeric(kind));
            }
        }
        reduce(
            self.points.range(TimeRange::new(start, end)),
            start,
            end,
            bucket_width,
            mode,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_empty_in(&self, start: i64, end: i64) -> bool {
        self.points.is_empty_in(TimeRange::new(start, end))
    }

    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn size_in(&self, start: i64, end: i64) -> usize {
        self.points.count_in(TimeRange::new(start, end))
    }

    /// Iterator over every point of this snapshot
    pub fn iter(&self) -> PointIter {
        self.iter_range(i64::MIN, i64::MAX)
    }

    /// Iterator over the points of `[start, end)`
    pub fn iter_range(&self, start: i64, end: i64) -> PointIter {
        PointIter {
            points: Arc::clone(&self.points),
            range: TimeRange::new(start, end),
            cursor: None,
        }
    }
}

/// Owning iterator over a snapshot.
///
/// Each call to `iter`/`iter_range` starts a fresh pass; later writes to the
/// series are not visible.
#[derive(Debug, Clone)]
pub struct PointIter {
    points: Arc<PointStore>,
    range: TimeRange,
    cursor: Option<i64>,
}

impl Iterator for PointIter {
    type Item = SampledPoint;

    fn next(&mut self) -> Option<SampledPoint> {
        let point = self.points.next_after(self.cursor, self.range)?.clone();
        self.cursor = Some(point.timestamp);
        Some(point)
    }
}
