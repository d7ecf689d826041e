//! Combining several series into one
//!
//! Sums and averages are evaluated at the union of the input timestamps.
//! Each input is read through its own interpolation mode, so a step series
//! contributes its held value between its points.

use std::collections::BTreeSet;

use tracing::debug;

use super::error::SeriesResult;
use super::schedule::Schedule;
use super::snapshot::SeriesSnapshot;
use super::traits::{ReadOnlyTimeSeries, TimeSeries};
use super::types::{InterpolationMode, Quality, SampledPoint, TimeRange, Value, ValueKind};

/// How `sum_of` and `average_of` build their result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineOptions {
    /// Interpolation mode of the result. Derived from the inputs when unset.
    pub mode: Option<InterpolationMode>,
    /// Also evaluate at `start` and `end`, unless they are `i64::MIN`/`i64::MAX`
    pub boundary_points: bool,
    /// A point is good once any input is good, instead of requiring all
    pub ignore_gaps: bool,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            mode: None,
            boundary_points: true,
            ignore_gaps: false,
        }
    }
}

impl CombineOptions {
    pub fn with_mode(mut self, mode: InterpolationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_boundary_points(mut self, boundary_points: bool) -> Self {
        self.boundary_points = boundary_points;
        self
    }

    pub fn ignoring_gaps(mut self) -> Self {
        self.ignore_gaps = true;
        self
    }
}

fn mode_rank(mode: InterpolationMode) -> u8 {
    match mode {
        InterpolationMode::None => 0,
        InterpolationMode::Steps => 1,
        InterpolationMode::Linear => 2,
        InterpolationMode::Nearest => 3,
    }
}

fn derived_mode(snapshots: &[SeriesSnapshot]) -> InterpolationMode {
    snapshots
        .iter()
        .map(SeriesSnapshot::interpolation_mode)
        .max_by_key(|mode| mode_rank(*mode))
        .unwrap_or(InterpolationMode::None)
}

fn combine<F>(
    id: String,
    series: &[&dyn ReadOnlyTimeSeries],
    start: i64,
    end: i64,
    options: &CombineOptions,
    reduce: F,
) -> SeriesResult<Schedule>
where
    F: Fn(&[f64]) -> f64,
{
    let snapshots: Vec<SeriesSnapshot> = series.iter().map(|s| s.snapshot()).collect();
    let mode = options.mode.unwrap_or_else(|| derived_mode(&snapshots));
    let target = Schedule::new(id, ValueKind::Double).with_interpolation_mode(mode)?;
    if start > end {
        return Ok(target);
    }

    let range = TimeRange::new(start, end);
    let mut timestamps: BTreeSet<i64> = snapshots
        .iter()
        .flat_map(|s| s.store().range(range).map(|p| p.timestamp))
        .collect();
    if options.boundary_points {
        if start != i64::MIN {
            timestamps.insert(start);
        }
        if end != i64::MAX && end > start {
            timestamps.insert(end);
        }
    }

    let mut values = Vec::with_capacity(snapshots.len());
    let points: Vec<SampledPoint> = timestamps
        .into_iter()
        .map(|t| {
            values.clear();
            let mut complete = true;
            for snapshot in &snapshots {
                match snapshot
                    .value_at(t)
                    .filter(SampledPoint::is_good)
                    .and_then(|p| p.value.as_f64())
                {
                    Some(v) => values.push(v),
                    None => complete = false,
                }
            }

            let good = !values.is_empty() && (complete || options.ignore_gaps);
            let quality = if good { Quality::Good } else { Quality::Bad };
            SampledPoint::new(t, Value::Double(reduce(&values)), quality)
        })
        .collect();

    debug!(
        "Combined {} series into {} points for {}",
        series.len(),
        points.len(),
        target.id()
    );
    target.insert_many(points, None);
    Ok(target)
}

/// Pointwise sum of `series` over `[start, end)` as a new double schedule
pub fn sum_of(
    id: impl Into<String>,
    series: &[&dyn ReadOnlyTimeSeries],
    start: i64,
    end: i64,
    options: &CombineOptions,
) -> SeriesResult<Schedule> {
    combine(id.into(), series, start, end, options, |values| {
        values.iter().sum()
    })
}

/// Pointwise mean of the inputs that have a good value; `0.0` where none has
pub fn average_of(
    id: impl Into<String>,
    series: &[&dyn ReadOnlyTimeSeries],
    start: i64,
    end: i64,
    options: &CombineOptions,
) -> SeriesResult<Schedule> {
    combine(id.into(), series, start, end, options, |values| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    })
}

/// Earliest stored timestamp `>= t` in any of the series
pub fn next_timestamp(series: &[&dyn ReadOnlyTimeSeries], t: i64) -> Option<i64> {
    series
        .iter()
        .filter_map(|s| s.next_at_or_after(t))
        .map(|p| p.timestamp)
        .min()
}

/// Latest stored timestamp `<= t` in any of the series
pub fn previous_timestamp(series: &[&dyn ReadOnlyTimeSeries], t: i64) -> Option<i64> {
    series
        .iter()
        .filter_map(|s| s.previous_at_or_before(t))
        .map(|p| p.timestamp)
        .max()
}
