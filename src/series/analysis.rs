//! Numeric analysis over a series: integral, average and extremes
//!
//! Time is measured in milliseconds, so an integral has unit `value * ms`.
//! Bad points never contribute.

use super::snapshot::SeriesSnapshot;
use super::traits::ReadOnlyTimeSeries;
use super::types::{InterpolationMode, SampledPoint, TimeRange, Value};

fn good_value(point: &SampledPoint) -> Option<f64> {
    if point.is_good() {
        point.value.as_f64()
    } else {
        None
    }
}

/// Area contributed between two consecutive points
fn segment_area(mode: InterpolationMode, a: &SampledPoint, b: &SampledPoint) -> Option<f64> {
    let dt = (b.timestamp as i128 - a.timestamp as i128) as f64;
    let (va, vb) = (good_value(a), good_value(b));

    match mode {
        InterpolationMode::Steps => va.map(|v| v * dt),
        InterpolationMode::Linear => Some((va? + vb?) / 2.0 * dt),
        InterpolationMode::Nearest => {
            if va.is_none() && vb.is_none() {
                return None;
            }
            let half = dt / 2.0;
            Some(va.unwrap_or(0.0) * half + vb.unwrap_or(0.0) * half)
        }
        InterpolationMode::None => None,
    }
}

fn integrate_snapshot(snapshot: &SeriesSnapshot, start: i64, end: i64) -> Option<f64> {
    let mode = snapshot.interpolation_mode();
    if start > end || mode == InterpolationMode::None {
        return None;
    }
    if start == end {
        return Some(0.0);
    }

    let points = snapshot.values_with_boundaries(start, end);
    let mut total = 0.0;
    let mut contributed = false;
    for pair in points.windows(2) {
        if let Some(area) = segment_area(mode, &pair[0], &pair[1]) {
            total += area;
            contributed = true;
        }
    }
    contributed.then_some(total)
}

/// Integral of the series over `[start, end]` under its interpolation mode.
///
/// `None` for mode `None`, for `start > end`, or when no segment is defined.
pub fn integrate<S>(series: &S, start: i64, end: i64) -> Option<f64>
where
    S: ReadOnlyTimeSeries + ?Sized,
{
    integrate_snapshot(&series.snapshot(), start, end)
}

/// Time-weighted average over `[start, end]`.
///
/// With mode `None` this is the arithmetic mean of the good points in
/// `[start, end)`. Reversed bounds are swapped.
pub fn average<S>(series: &S, start: i64, end: i64) -> Option<f64>
where
    S: ReadOnlyTimeSeries + ?Sized,
{
    let (start, end) = (start.min(end), start.max(end));
    let snapshot = series.snapshot();

    if snapshot.interpolation_mode() == InterpolationMode::None {
        let (sum, count) = snapshot
            .store()
            .range(TimeRange::new(start, end))
            .filter_map(good_value)
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        return (count > 0).then(|| sum / count as f64);
    }

    if start == end {
        return snapshot.value_at(start).as_ref().and_then(good_value);
    }
    let integral = integrate_snapshot(&snapshot, start, end)?;
    Some(integral / (end as i128 - start as i128) as f64)
}

fn extreme<S, F>(series: &S, start: i64, end: i64, better: F) -> Option<SampledPoint>
where
    S: ReadOnlyTimeSeries + ?Sized,
    F: Fn(f64, f64) -> bool,
{
    let snapshot = series.snapshot();
    let mut best: Option<(i64, f64)> = None;

    for point in snapshot.store().range(TimeRange::new(start, end)) {
        if let Some(v) = good_value(point) {
            match best {
                Some((_, current)) if !better(v, current) => {}
                _ => best = Some((point.timestamp, v)),
            }
        }
    }
    best.map(|(t, v)| SampledPoint::good(t, Value::Double(v)))
}

/// Largest good value in `[start, end)`, as a double point at its timestamp
pub fn maximum<S>(series: &S, start: i64, end: i64) -> Option<SampledPoint>
where
    S: ReadOnlyTimeSeries + ?Sized,
{
    extreme(series, start, end, |candidate, best| candidate > best)
}

/// Smallest good value in `[start, end)`
pub fn minimum<S>(series: &S, start: i64, end: i64) -> Option<SampledPoint>
where
    S: ReadOnlyTimeSeries + ?Sized,
{
    extreme(series, start, end, |candidate, best| candidate < best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{Schedule, TimeSeries, ValueKind, EMPTY_SERIES};

    fn ramp(mode: InterpolationMode) -> Schedule {
        let schedule = Schedule::new("ramp", ValueKind::Double)
            .with_interpolation_mode(mode)
            .unwrap();
        schedule.insert_many(
            vec![
                SampledPoint::good(0, Value::Double(0.0)),
                SampledPoint::good(10, Value::Double(10.0)),
            ],
            None,
        );
        schedule
    }

    #[test]
    fn test_integrate_per_mode() {
        assert_eq!(integrate(&ramp(InterpolationMode::Linear), 0, 10), Some(50.0));
        assert_eq!(integrate(&ramp(InterpolationMode::Steps), 0, 10), Some(0.0));
        assert_eq!(integrate(&ramp(InterpolationMode::Steps), 0, 20), Some(100.0));
        assert_eq!(integrate(&ramp(InterpolationMode::Nearest), 0, 10), Some(50.0));
        assert_eq!(integrate(&ramp(InterpolationMode::None), 0, 10), None);
        assert_eq!(integrate(&ramp(InterpolationMode::Linear), 5, 5), Some(0.0));
        assert_eq!(integrate(&ramp(InterpolationMode::Linear), 10, 5), None);
    }

    #[test]
    fn test_integrate_partial_linear() {
        // Before the first point the linear value is undefined
        let result = integrate(&ramp(InterpolationMode::Linear), -10, 5).unwrap();
        assert!((result - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_bad_segment_skipped() {
        let schedule = ramp(InterpolationMode::Steps);
        schedule.insert(SampledPoint::bad(5, Value::Double(1000.0)), None);

        assert_eq!(integrate(&schedule, 0, 10), Some(0.0));
        assert_eq!(maximum(&schedule, 0, 11).unwrap().value, Value::Double(10.0));
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&ramp(InterpolationMode::Linear), 0, 10), Some(5.0));
        assert_eq!(average(&ramp(InterpolationMode::None), 0, 11), Some(5.0));
        assert_eq!(average(&ramp(InterpolationMode::None), 0, 10), Some(0.0));
        assert_eq!(average(&ramp(InterpolationMode::Linear), 5, 5), Some(5.0));
        assert_eq!(average(&ramp(InterpolationMode::Linear), 10, 0), Some(5.0));
        assert_eq!(average(&ramp(InterpolationMode::None), 11, 0), Some(5.0));
        assert_eq!(average(&EMPTY_SERIES, 0, 10), None);
    }

    #[test]
    fn test_extremes() {
        let schedule = Schedule::new("ints", ValueKind::Integer);
        schedule.insert_many(
            vec![
                SampledPoint::good(1, Value::Integer(4)),
                SampledPoint::good(2, Value::Integer(-3)),
                SampledPoint::good(3, Value::Integer(9)),
            ],
            None,
        );

        let max = maximum(&schedule, 0, 10).unwrap();
        assert_eq!((max.timestamp, max.value), (3, Value::Double(9.0)));
        let min = minimum(&schedule, 0, 10).unwrap();
        assert_eq!((min.timestamp, min.value), (2, Value::Double(-3.0)));
        assert!(maximum(&schedule, 4, 10).is_none());
    }
}
