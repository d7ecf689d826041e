//! Replaying historical samples through a recorder
//!
//! The samples drive a `LiveValue` and a `ManualScheduler`, so a recording
//! policy can be applied offline to data that was sampled elsewhere.

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::RecordingConfig;
use super::error::RecordingResult;
use super::recorder::{Recorder, RecorderStats};
use super::scheduler::ManualScheduler;
use super::source::LiveValue;
use crate::series::{SampledPoint, Schedule, ValueKind};

/// Series produced by a replay and what the recorder did
pub struct Replay {
    pub series: Arc<Schedule>,
    pub stats: RecorderStats,
}

/// Record `samples` into a new series under `config`.
///
/// Samples are taken in time order. Recording starts at the first good
/// sample; a bad sample marks the source inactive until the next good one.
/// Interval ticks run up to and including the last sample's timestamp.
pub fn replay_samples(
    id: impl Into<String>,
    samples: &[SampledPoint],
    config: RecordingConfig,
) -> RecordingResult<Replay> {
    config.validate()?;

    let mut ordered: Vec<&SampledPoint> = samples.iter().collect();
    ordered.sort_by_key(|p| p.timestamp);
    let Some(start) = ordered.iter().position(|p| p.is_good()) else {
        return Ok(Replay {
            series: Arc::new(Schedule::new(id, ValueKind::Double)),
            stats: RecorderStats::default(),
        });
    };
    let first = ordered[start];

    let source = Arc::new(LiveValue::new(first.value.clone()));
    let series = Arc::new(Schedule::new(id, first.value.kind()));
    let scheduler = Arc::new(ManualScheduler::new(first.timestamp));
    let recorder = Recorder::new(source.clone(), series.clone(), scheduler.clone());
    recorder.configure(Some(config))?;

    for sample in &ordered[start..] {
        // Ticks at the sample's own timestamp see the new value
        scheduler.advance_to(sample.timestamp.saturating_sub(1));
        source.set_active(sample.is_good());
        if !sample.is_good() {
            continue;
        }
        if !source.set(sample.value.clone()) {
            warn!(
                "Skipping {} sample at {} for a {} source",
                sample.value.kind(),
                sample.timestamp,
                first.value.kind()
            );
            continue;
        }
        recorder.on_value_changed(sample.timestamp);
    }
    if let Some(last) = ordered.last() {
        scheduler.advance_to(last.timestamp);
    }

    recorder.close();
    let stats = recorder.stats();
    debug!(
        "Replayed {} samples with policy {}: {} points written",
        ordered.len() - start,
        config.policy,
        stats.points_written
    );
    Ok(Replay { series, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::error::RecordingError;
    use crate::series::{Quality, ReadOnlyTimeSeries, Value};

    fn good(t: i64, v: f64) -> SampledPoint {
        SampledPoint::good(t, Value::Double(v))
    }

    fn recorded(replay: &Replay) -> Vec<(i64, f64)> {
        replay
            .series
            .iter()
            .map(|p| (p.timestamp, p.value.as_f64().unwrap()))
            .collect()
    }

    #[test]
    fn test_replay_on_value_changed() {
        let samples = [good(0, 1.0), good(10, 1.0), good(20, 2.0), good(30, 2.0)];
        let replay =
            replay_samples("replay", &samples, RecordingConfig::on_value_changed()).unwrap();

        assert_eq!(recorded(&replay), vec![(0, 1.0), (20, 2.0)]);
        assert_eq!(replay.stats.points_written, 2);
    }

    #[test]
    fn test_replay_on_value_update() {
        let samples = [good(30, 2.0), good(0, 1.0), good(10, 1.0), good(20, 2.0)];
        let replay =
            replay_samples("replay", &samples, RecordingConfig::on_value_update()).unwrap();

        assert_eq!(
            recorded(&replay),
            vec![(0, 1.0), (10, 1.0), (20, 2.0), (30, 2.0)]
        );
    }

    #[test]
    fn test_replay_fixed_interval() {
        let samples = [good(0, 1.0), good(10, 2.0), good(40, 3.0)];
        let replay =
            replay_samples("replay", &samples, RecordingConfig::fixed_interval(10)).unwrap();

        assert_eq!(
            recorded(&replay),
            vec![(10, 2.0), (20, 2.0), (30, 2.0), (40, 3.0)]
        );
        assert!(replay.series.iter().all(|p| p.quality == Quality::Good));
    }

    #[test]
    fn test_bad_sample_pauses_interval_recording() {
        let samples = [
            good(0, 1.0),
            SampledPoint::bad(10, Value::Double(0.0)),
            good(30, 5.0),
        ];
        let replay =
            replay_samples("replay", &samples, RecordingConfig::fixed_interval(10)).unwrap();

        assert_eq!(recorded(&replay), vec![(30, 5.0)]);
        assert_eq!(replay.stats.points_written, 1);
    }

    #[test]
    fn test_replay_edge_cases() {
        assert_eq!(
            replay_samples("replay", &[good(0, 1.0)], RecordingConfig::fixed_interval(0)).err(),
            Some(RecordingError::InvalidInterval(0))
        );

        let only_bad = [SampledPoint::bad(5, Value::Double(1.0))];
        let replay =
            replay_samples("replay", &only_bad, RecordingConfig::on_value_update()).unwrap();
        assert!(replay.series.is_empty());
        assert_eq!(replay.stats, RecorderStats::default());
    }
}
