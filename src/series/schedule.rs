//! In-memory schedule: the concrete time series
//!
//! ```text
//!   readers                         writer
//!     |                               |
//!     | read lock (brief)             | write lock (brief)
//!     v                               v
//!  clone Arc<PointStore> -----> Arc::make_mut(points)
//!     |                        (copies only if a snapshot is alive)
//!     v
//!  query lock-free
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{SeriesError, SeriesResult};
use super::lock::{TreeLock, TreeReadGuard, TreeWriteGuard};
use super::snapshot::SeriesSnapshot;
use super::store::PointStore;
use super::traits::{ReadOnlyTimeSeries, TimeSeries};
use super::types::{InterpolationMode, SampledPoint, TimeRange, ValueKind};

/// Whether a series accepts writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesAccess {
    Writable,
    ReadOnly,
    /// Placeholder series; writes are rejected until materialized
    Virtual,
}

#[derive(Debug, Clone)]
struct SeriesState {
    points: Arc<PointStore>,
    mode: InterpolationMode,
    last_calculation: Option<i64>,
    access: SeriesAccess,
}

/// A time series of a single value kind
pub struct Schedule {
    id: String,
    value_kind: ValueKind,
    state: RwLock<SeriesState>,
    tree_lock: Option<Arc<dyn TreeLock>>,
}

impl Schedule {
    /// Create an empty, writable schedule with interpolation mode `None`
    pub fn new(id: impl Into<String>, value_kind: ValueKind) -> Self {
        Self {
            id: id.into(),
            value_kind,
            state: RwLock::new(SeriesState {
                points: Arc::new(PointStore::new()),
                mode: InterpolationMode::None,
                last_calculation: None,
                access: SeriesAccess::Writable,
            }),
            tree_lock: None,
        }
    }

    /// Create a virtual schedule that rejects writes until materialized
    pub fn virtual_series(id: impl Into<String>, value_kind: ValueKind) -> Self {
        Self::new(id, value_kind).with_access(SeriesAccess::Virtual)
    }

    pub fn with_interpolation_mode(self, mode: InterpolationMode) -> SeriesResult<Self> {
        check_mode(self.value_kind, mode)?;
        self.write_state().mode = mode;
        Ok(self)
    }

    pub fn with_access(self, access: SeriesAccess) -> Self {
        self.write_state().access = access;
        self
    }

    /// Acquire the given tree lock around every operation
    pub fn with_tree_lock(mut self, lock: Arc<dyn TreeLock>) -> Self {
        self.tree_lock = Some(lock);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn access(&self) -> SeriesAccess {
        self.read_state().access
    }

    pub fn set_access(&self, access: SeriesAccess) {
        let _tree = self.tree_lock.as_deref().map(TreeWriteGuard::acquire);
        self.write_state().access = access;
    }

    /// Turn a virtual schedule into a writable one.
    ///
    /// Returns `true` if the access state changed.
    pub fn materialize(&self) -> bool {
        let _tree = self.tree_lock.as_deref().map(TreeWriteGuard::acquire);
        let mut state = self.write_state();
        if state.access == SeriesAccess::Virtual {
            state.access = SeriesAccess::Writable;
            debug!("Materialized schedule {}", self.id);
            true
        } else {
            false
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SeriesState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SeriesState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject points of the wrong kind before touching the store
    fn accepts(&self, points: &[SampledPoint]) -> bool {
        match points.iter().find(|p| p.value.kind() != self.value_kind) {
            Some(p) => {
                debug!(
                    "Schedule {} rejected {} value at {} (expects {})",
                    self.id,
                    p.value.kind(),
                    p.timestamp,
                    self.value_kind
                );
                false
            }
            None => true,
        }
    }

    /// Apply a mutation under the write lock, if the schedule is writable
    fn mutate<F>(&self, operation: &str, calculated_at: Option<i64>, apply: F) -> bool
    where
        F: FnOnce(&mut PointStore),
    {
        let _tree = self.tree_lock.as_deref().map(TreeWriteGuard::acquire);
        let mut state = self.write_state();

        if state.access != SeriesAccess::Writable {
            debug!(
                "Schedule {} is {:?}, rejecting {}",
                self.id, state.access, operation
            );
            return false;
        }

        apply(Arc::make_mut(&mut state.points));
        if calculated_at.is_some() {
            state.last_calculation = calculated_at;
        }
        true
    }
}

fn check_mode(kind: ValueKind, mode: InterpolationMode) -> SeriesResult<()> {
    if mode == InterpolationMode::Linear && !kind.is_numeric() {
        return Err(SeriesError::NotInterpolable { kind, mode });
    }
    Ok(())
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("Schedule")
            .field("id", &self.id)
            .field("value_kind", &self.value_kind)
            .field("mode", &state.mode)
            .field("access", &state.access)
            .field("points", &state.points.len())
            .field("tree_lock", &self.tree_lock.is_some())
            .finish()
    }
}

impl ReadOnlyTimeSeries for Schedule {
    fn snapshot(&self) -> SeriesSnapshot {
        let _tree = self.tree_lock.as_deref().map(TreeReadGuard::acquire);
        let state = self.read_state();
        SeriesSnapshot::new(
            Arc::clone(&state.points),
            state.mode,
            state.last_calculation,
            Some(self.value_kind),
        )
    }

    fn value_kind(&self) -> Option<ValueKind> {
        Some(self.value_kind)
    }
}

impl TimeSeries for Schedule {
    fn insert_many(&self, points: Vec<SampledPoint>, calculated_at: Option<i64>) -> bool {
        if !self.accepts(&points) {
            return false;
        }
        self.mutate("insert", calculated_at, |store| store.insert_many(points))
    }

    fn delete(&self, start: i64, end: i64, calculated_at: Option<i64>) -> bool {
        self.mutate("delete", calculated_at, |store| {
            store.delete(TimeRange::new(start, end));
        })
    }

    fn replace(
        &self,
        start: i64,
        end: i64,
        points: Vec<SampledPoint>,
        calculated_at: Option<i64>,
    ) -> bool {
        if !self.accepts(&points) {
            return false;
        }
        let id = &self.id;
        self.mutate("replace", calculated_at, |store| {
            let dropped = store.replace(TimeRange::new(start, end), points);
            if dropped > 0 {
                debug!(
                    "Schedule {} dropped {} points outside [{}, {})",
                    id, dropped, start, end
                );
            }
        })
    }

    fn delete_before(&self, end: i64, calculated_at: Option<i64>) -> bool {
        self.mutate("delete_before", calculated_at, |store| {
            store.delete_before(end);
        })
    }

    fn shift_timestamps(&self, delta: i64) -> bool {
        let id = &self.id;
        self.mutate("shift", None, |store| {
            let discarded = store.shift(delta);
            if discarded > 0 {
                warn!(
                    "Schedule {} discarded {} points shifted out of range",
                    id, discarded
                );
            }
        })
    }

    fn set_interpolation_mode(&self, mode: InterpolationMode) -> SeriesResult<()> {
        check_mode(self.value_kind, mode)?;
        let _tree = self.tree_lock.as_deref().map(TreeWriteGuard::acquire);
        self.write_state().mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::lock::tests::RecordingLock;
    use crate::series::types::{Quality, ReductionMode, Value};
    use crate::series::EMPTY_SERIES;

    fn double(t: i64, v: f64) -> SampledPoint {
        SampledPoint::good(t, Value::Double(v))
    }

    /// Points t=1..5 with values 1.5..5.5
    fn example_schedule(mode: InterpolationMode) -> Schedule {
        let schedule = Schedule::new("example", ValueKind::Double)
            .with_interpolation_mode(mode)
            .unwrap();
        let points = (1..=5).map(|t| double(t, t as f64 + 0.5)).collect();
        assert!(schedule.insert_many(points, None));
        schedule
    }

    fn as_f64(point: Option<SampledPoint>) -> f64 {
        point.unwrap().value.as_f64().unwrap()
    }

    #[test]
    fn test_example_scenario() {
        let schedule = example_schedule(InterpolationMode::Linear);

        assert_eq!(as_f64(schedule.value_at(2)), 2.5);
        assert_eq!(
            schedule.range(2, 4),
            vec![double(2, 2.5), double(3, 3.5)]
        );

        assert!(schedule.replace(2, 3, vec![double(2, 42.0)], None));
        assert_eq!(as_f64(schedule.value_at(2)), 42.0);
        assert_eq!(schedule.size(), 5);
    }

    #[test]
    fn test_exact_hit_in_every_mode() {
        for mode in InterpolationMode::all() {
            let schedule = example_schedule(*mode);
            for point in schedule.range(i64::MIN, i64::MAX) {
                assert_eq!(schedule.value_at(point.timestamp), Some(point));
            }
        }
    }

    #[test]
    fn test_round_trip_collapses_duplicates() {
        let schedule = Schedule::new("s", ValueKind::Double);
        schedule.insert_many(
            vec![double(3, 1.0), double(1, 2.0), double(3, 3.0), double(2, 4.0)],
            None,
        );

        assert_eq!(
            schedule.range(i64::MIN, i64::MAX),
            vec![double(1, 2.0), double(2, 4.0), double(3, 3.0)]
        );
    }

    #[test]
    fn test_replace_idempotent() {
        let schedule = example_schedule(InterpolationMode::None);
        let points = vec![double(2, 20.0), double(3, 30.0), double(9, 90.0)];

        schedule.replace(2, 5, points.clone(), None);
        let once = schedule.range(i64::MIN, i64::MAX);
        schedule.replace(2, 5, points, None);

        assert_eq!(schedule.range(i64::MIN, i64::MAX), once);
        assert!(schedule.value_at(9).is_none());
    }

    #[test]
    fn test_default_mode_is_none() {
        let schedule = Schedule::new("fresh", ValueKind::Double);
        assert_eq!(schedule.interpolation_mode(), InterpolationMode::None);
        assert!(schedule.insert(double(10, 1.0), None));
        assert!(schedule.value_at(11).is_none());
    }

    #[test]
    fn test_insert_overwrites_same_timestamp() {
        let schedule = Schedule::new("s", ValueKind::Double);
        assert!(schedule.insert(double(7, 1.0), None));
        assert!(schedule.insert(double(7, 2.0), None));

        assert_eq!(schedule.range(i64::MIN, i64::MAX), vec![double(7, 2.0)]);
    }

    #[test]
    fn test_nearest_and_steps() {
        let schedule = Schedule::new("s", ValueKind::Double);
        schedule.insert_many(vec![double(10, 1.0), double(20, 2.0)], None);

        schedule
            .set_interpolation_mode(InterpolationMode::Nearest)
            .unwrap();
        assert_eq!(as_f64(schedule.value_at(15)), 2.0);
        assert_eq!(as_f64(schedule.value_at(14)), 1.0);
        assert_eq!(as_f64(schedule.value_at(0)), 1.0);

        schedule
            .set_interpolation_mode(InterpolationMode::Steps)
            .unwrap();
        assert_eq!(as_f64(schedule.value_at(19)), 1.0);
        assert!(schedule.value_at(9).is_none());
        assert_eq!(schedule.value_at(100).unwrap().timestamp, 100);
    }

    #[test]
    fn test_linear_midpoint() {
        let schedule = Schedule::new("s", ValueKind::Double)
            .with_interpolation_mode(InterpolationMode::Linear)
            .unwrap();
        schedule.insert_many(vec![double(100, 3.0), double(300, 8.0)], None);

        let mid = as_f64(schedule.value_at(200));
        assert!((mid - 5.5).abs() < 1e-9);
        assert!(schedule.value_at(50).is_none());
        assert!(schedule.value_at(400).is_none());
    }

    #[test]
    fn test_linear_rejected_for_non_numeric() {
        let schedule = Schedule::new("labels", ValueKind::String);
        assert_eq!(
            schedule.set_interpolation_mode(InterpolationMode::Linear),
            Err(SeriesError::NotInterpolable {
                kind: ValueKind::String,
                mode: InterpolationMode::Linear,
            })
        );
        assert!(Schedule::new("flags", ValueKind::Boolean)
            .with_interpolation_mode(InterpolationMode::Linear)
            .is_err());
        assert!(schedule
            .set_interpolation_mode(InterpolationMode::Steps)
            .is_ok());
    }

    #[test]
    fn test_neighbour_queries() {
        let schedule = example_schedule(InterpolationMode::None);

        assert_eq!(schedule.next_at_or_after(i64::MIN).unwrap().timestamp, 1);
        assert_eq!(schedule.next_at_or_after(3).unwrap().timestamp, 3);
        assert!(schedule.next_at_or_after(6).is_none());
        assert_eq!(schedule.previous_at_or_before(i64::MAX).unwrap().timestamp, 5);
        assert!(schedule.previous_at_or_before(0).is_none());
    }

    #[test]
    fn test_delete_ranges() {
        let schedule = example_schedule(InterpolationMode::None);

        assert!(schedule.delete(2, 4, None));
        assert_eq!(schedule.size(), 3);
        assert!(schedule.is_empty_in(2, 4));

        assert!(schedule.delete(i64::MIN, i64::MAX, None));
        assert!(schedule.is_empty());
        assert!(schedule.range(i64::MIN, i64::MAX).is_empty());
    }

    #[test]
    fn test_empty_interval_at_max_timestamp() {
        let schedule = Schedule::new("edge", ValueKind::Double);
        assert!(schedule.insert_many(vec![double(1, 1.0), double(i64::MAX, 2.0)], None));

        assert!(schedule.range(i64::MAX, i64::MAX).is_empty());
        assert_eq!(schedule.size_in(i64::MAX, i64::MAX), 0);
        assert!(schedule.is_empty_in(i64::MAX, i64::MAX));

        assert!(schedule.delete(i64::MAX, i64::MAX, None));
        assert_eq!(schedule.size(), 2);
        assert_eq!(schedule.range(2, i64::MAX), vec![double(i64::MAX, 2.0)]);
    }

    #[test]
    fn test_replace_round_trip_any_range() {
        let schedule = example_schedule(InterpolationMode::Steps);
        let before = schedule.range(i64::MIN, i64::MAX);

        for (start, end) in [(i64::MIN, i64::MAX), (2, 4), (0, 100), (3, 3)] {
            let points = schedule.range(start, end);
            assert!(schedule.replace(start, end, points, None));
            assert_eq!(schedule.range(i64::MIN, i64::MAX), before);
        }
    }

    #[test]
    fn test_replace_fixed_step() {
        let schedule = example_schedule(InterpolationMode::None);
        let values = vec![Value::Double(10.0), Value::Double(20.0)];

        assert!(schedule.replace_fixed_step(2, values, 1, Some(99)));

        let stamps: Vec<i64> = schedule.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1, 2, 3, 4, 5]);
        assert_eq!(as_f64(schedule.value_at(3)), 20.0);
        assert_eq!(as_f64(schedule.value_at(4)), 4.5);
        assert_eq!(schedule.last_calculation_time(), Some(99));

        assert!(!schedule.replace_fixed_step(0, vec![Value::Double(1.0)], 0, None));
    }

    #[test]
    fn test_calculation_time_overwritten() {
        let schedule = Schedule::new("s", ValueKind::Double);
        assert_eq!(schedule.last_calculation_time(), None);

        schedule.insert(double(1, 1.0), Some(1000));
        assert_eq!(schedule.last_calculation_time(), Some(1000));

        schedule.insert(double(2, 1.0), None);
        assert_eq!(schedule.last_calculation_time(), Some(1000));

        schedule.delete(0, 10, Some(500));
        assert_eq!(schedule.last_calculation_time(), Some(500));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let schedule = Schedule::new("s", ValueKind::Float);
        let mixed = vec![
            SampledPoint::good(1, Value::Float(1.0)),
            SampledPoint::good(2, Value::Double(2.0)),
        ];

        assert!(!schedule.insert_many(mixed, Some(5)));
        assert!(schedule.is_empty());
        assert_eq!(schedule.last_calculation_time(), None);
    }

    #[test]
    fn test_virtual_and_read_only_reject_writes() {
        let schedule = Schedule::virtual_series("v", ValueKind::Double);
        assert!(!schedule.insert(double(1, 1.0), None));
        assert!(schedule.is_empty());

        assert!(schedule.materialize());
        assert!(!schedule.materialize());
        assert!(schedule.insert(double(1, 1.0), None));

        schedule.set_access(SeriesAccess::ReadOnly);
        assert!(!schedule.delete_all());
        assert_eq!(schedule.size(), 1);
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let schedule = example_schedule(InterpolationMode::None);
        let iter = schedule.iter();

        schedule.delete_all();
        schedule.insert(double(100, 1.0), None);

        let stamps: Vec<i64> = iter.map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1, 2, 3, 4, 5]);
        assert_eq!(schedule.size(), 1);
    }

    #[test]
    fn test_bad_points_kept() {
        let schedule = Schedule::new("s", ValueKind::Double)
            .with_interpolation_mode(InterpolationMode::Steps)
            .unwrap();
        schedule.insert(SampledPoint::bad(10, Value::Double(f64::NAN)), None);

        let point = schedule.value_at(20).unwrap();
        assert_eq!(point.quality, Quality::Bad);
        assert_eq!(schedule.size_in(0, 11), 1);
    }

    #[test]
    fn test_reduced_range_on_schedule() {
        let schedule = Schedule::new("s", ValueKind::Float);
        let points = (4..=12)
            .map(|i| SampledPoint::good(i * 1000, Value::Float(i as f32)))
            .collect();
        schedule.insert_many(points, None);

        let reduced = schedule
            .reduced_range(0, 15001, 5000, ReductionMode::Average)
            .unwrap();
        let values: Vec<f64> = reduced
            .iter()
            .take(3)
            .map(|p| p.value.as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![4.0, 7.0, 11.0]);
        assert_eq!(reduced[3].quality, Quality::Bad);
    }

    #[test]
    fn test_shift_and_delete_before() {
        let schedule = example_schedule(InterpolationMode::None);

        assert!(schedule.shift_timestamps(10));
        assert_eq!(schedule.next_at_or_after(i64::MIN).unwrap().timestamp, 11);

        assert!(schedule.delete_before(13, None));
        assert_eq!(schedule.size(), 3);
    }

    #[test]
    fn test_copy_from() {
        let source = example_schedule(InterpolationMode::Linear);
        let target = Schedule::new("copy", ValueKind::Double);
        target.insert(double(100, 0.0), None);

        assert!(target.copy_from(&source, 2, 4));
        assert_eq!(target.size(), 3);
        assert_eq!(target.interpolation_mode(), InterpolationMode::Linear);

        assert!(target.copy_from(&EMPTY_SERIES, i64::MIN, i64::MAX));
        assert!(target.is_empty());
        assert_eq!(target.interpolation_mode(), InterpolationMode::None);
    }

    #[test]
    fn test_tree_lock_wraps_operations() {
        let lock = Arc::new(RecordingLock::default());
        let schedule = Schedule::new("locked", ValueKind::Double).with_tree_lock(lock.clone());

        schedule.insert(double(1, 1.0), None);
        schedule.value_at(1);

        assert_eq!(
            lock.calls(),
            vec!["lock_write", "unlock_write", "lock_read", "unlock_read"]
        );
    }

    #[test]
    fn test_concurrent_readers_see_whole_batches() {
        let schedule = Arc::new(Schedule::new("s", ValueKind::Double));

        let writer = {
            let schedule = Arc::clone(&schedule);
            std::thread::spawn(move || {
                for round in 0..200 {
                    let batch = (0..10).map(|t| double(t, round as f64)).collect();
                    assert!(schedule.replace(0, 10, batch, None));
                }
            })
        };

        for _ in 0..200 {
            let snapshot = schedule.range(0, 10);
            assert!(snapshot.len() == 0 || snapshot.len() == 10);
            if let Some(first) = snapshot.first() {
                assert!(snapshot.iter().all(|p| p.value == first.value));
            }
        }
        writer.join().unwrap();
    }
}
