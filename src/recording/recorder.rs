//! Recording policy state machine
//!
//! ```text
//!            configure(Some(cfg))           configure(Some(other))
//!  Disabled ───────────────────> Configured ──────────────────────┐
//!     ^                              │   ^                        │
//!     │        configure(None)       │   └── teardown + rebuild ──┘
//!     └──────────────────────────────┘
//! ```
//!
//! Events are handled under the recorder lock. Teardown cancels the timer
//! under the same lock, so once `configure` returns no tick of the old
//! policy can write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::config::{RecordingConfig, RecordingPolicy};
use super::error::{RecordingError, RecordingResult};
use super::scheduler::{TimerCallback, TimerId, TimerScheduler};
use super::source::ValueSource;
use crate::series::{ReadOnlyTimeSeries, SampledPoint, TimeSeries, Value};

/// Event delivered to a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEvent {
    /// The source reported a new value (changed or merely refreshed)
    ValueChanged { time: i64 },
    /// A timer registered by the recorder elapsed
    IntervalElapsed { timer: TimerId, time: i64 },
}

/// Counters describing what a recorder did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    pub points_written: u64,
    pub failed_writes: u64,
    pub ignored_events: u64,
}

/// Notified when the target series rejects a recorded point
pub trait RecordingObserver: Send + Sync {
    fn write_failed(&self, point: &SampledPoint);
}

struct ActivePolicy {
    config: RecordingConfig,
    last_value: Option<Value>,
    timer: Option<TimerId>,
}

enum RecorderState {
    Disabled,
    Configured(ActivePolicy),
}

#[derive(Default)]
struct Counters {
    points_written: AtomicU64,
    failed_writes: AtomicU64,
    ignored_events: AtomicU64,
}

/// Turns a live value into recorded points under a recording policy
pub struct Recorder {
    me: Weak<Recorder>,
    source: Arc<dyn ValueSource>,
    series: Arc<dyn TimeSeries>,
    scheduler: Arc<dyn TimerScheduler>,
    observer: Option<Arc<dyn RecordingObserver>>,
    state: Mutex<RecorderState>,
    counters: Counters,
}

impl Recorder {
    /// Create a disabled recorder writing `source` into `series`
    pub fn new(
        source: Arc<dyn ValueSource>,
        series: Arc<dyn TimeSeries>,
        scheduler: Arc<dyn TimerScheduler>,
    ) -> Arc<Self> {
        Self::build(source, series, scheduler, None)
    }

    /// Like `new`, reporting failed writes to `observer`
    pub fn with_observer(
        source: Arc<dyn ValueSource>,
        series: Arc<dyn TimeSeries>,
        scheduler: Arc<dyn TimerScheduler>,
        observer: Arc<dyn RecordingObserver>,
    ) -> Arc<Self> {
        Self::build(source, series, scheduler, Some(observer))
    }

    fn build(
        source: Arc<dyn ValueSource>,
        series: Arc<dyn TimeSeries>,
        scheduler: Arc<dyn TimerScheduler>,
        observer: Option<Arc<dyn RecordingObserver>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            source,
            series,
            scheduler,
            observer,
            state: Mutex::new(RecorderState::Disabled),
            counters: Counters::default(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install, replace or (with `None`) remove the recording configuration.
    ///
    /// Validation happens before any state change, so a failed call leaves
    /// the previous configuration running.
    pub fn configure(&self, config: Option<RecordingConfig>) -> RecordingResult<()> {
        let Some(config) = config else {
            let mut state = self.lock_state();
            self.teardown(&mut state);
            debug!("Recording disabled");
            return Ok(());
        };

        config.validate()?;
        let source_kind = self.source.value_kind();
        if !source_kind.is_recordable() {
            return Err(RecordingError::UnsupportedValueType(source_kind));
        }
        if let Some(series_kind) = self.series.value_kind() {
            if series_kind != source_kind {
                return Err(RecordingError::KindMismatch {
                    source_kind,
                    series_kind,
                });
            }
        }

        let mut state = self.lock_state();
        self.teardown(&mut state);

        let mut active = ActivePolicy {
            config,
            last_value: None,
            timer: None,
        };
        match config.policy {
            RecordingPolicy::FixedInterval => {
                active.timer = Some(
                    self.scheduler
                        .schedule(config.interval_ms, self.tick_callback()),
                );
            }
            RecordingPolicy::OnValueChanged => {
                let value = self.source.current_value();
                self.write(SampledPoint::good(self.scheduler.now(), value.clone()));
                active.last_value = Some(value);
            }
            RecordingPolicy::OnValueUpdate => {}
        }

        *state = RecorderState::Configured(active);
        debug!(
            "Recording configured: policy={}, interval={}ms",
            config.policy, config.interval_ms
        );
        Ok(())
    }

    /// Detach the configuration and release the timer
    pub fn close(&self) {
        let mut state = self.lock_state();
        self.teardown(&mut state);
    }

    pub fn config(&self) -> Option<RecordingConfig> {
        match &*self.lock_state() {
            RecorderState::Configured(active) => Some(active.config),
            RecorderState::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config().is_some()
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            points_written: self.counters.points_written.load(Ordering::Relaxed),
            failed_writes: self.counters.failed_writes.load(Ordering::Relaxed),
            ignored_events: self.counters.ignored_events.load(Ordering::Relaxed),
        }
    }

    /// React to a value-changed notification from the source
    pub fn on_value_changed(&self, time: i64) {
        self.handle(RecordingEvent::ValueChanged { time });
    }

    /// React to a timer tick
    pub fn on_interval_elapsed(&self, timer: TimerId, time: i64) {
        self.handle(RecordingEvent::IntervalElapsed { timer, time });
    }

    /// Handle events from a channel until every sender is dropped
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<RecordingEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!("Recording event channel closed");
    }

    pub fn handle(&self, event: RecordingEvent) {
        let mut state = self.lock_state();
        let RecorderState::Configured(active) = &mut *state else {
            self.ignore();
            return;
        };

        match (active.config.policy, event) {
            (RecordingPolicy::OnValueUpdate, RecordingEvent::ValueChanged { time }) => {
                self.write(SampledPoint::good(time, self.source.current_value()));
            }
            (RecordingPolicy::OnValueChanged, RecordingEvent::ValueChanged { time }) => {
                let value = self.source.current_value();
                let changed = active
                    .last_value
                    .as_ref()
                    .map_or(true, |last| !last.same_as(&value));
                if changed {
                    self.write(SampledPoint::good(time, value.clone()));
                }
                active.last_value = Some(value);
            }
            (RecordingPolicy::FixedInterval, RecordingEvent::IntervalElapsed { timer, time })
                if active.timer == Some(timer) =>
            {
                if self.source.is_active() {
                    self.write(SampledPoint::good(time, self.source.current_value()));
                } else {
                    self.ignore();
                }
            }
            _ => self.ignore(),
        }
    }

    fn tick_callback(&self) -> TimerCallback {
        let me = self.me.clone();
        Arc::new(move |timer, time| {
            if let Some(recorder) = me.upgrade() {
                recorder.on_interval_elapsed(timer, time);
            }
        })
    }

    fn teardown(&self, state: &mut RecorderState) {
        if let RecorderState::Configured(active) = state {
            if let Some(timer) = active.timer.take() {
                self.scheduler.cancel(timer);
            }
        }
        *state = RecorderState::Disabled;
    }

    fn ignore(&self) {
        self.counters.ignored_events.fetch_add(1, Ordering::Relaxed);
    }

    fn write(&self, point: SampledPoint) {
        if self.series.insert(point.clone(), None) {
            self.counters.points_written.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.counters.failed_writes.fetch_add(1, Ordering::Relaxed);
        error!(
            "Failed to record {} value at {}",
            point.value.kind(),
            point.timestamp
        );
        if let Some(observer) = &self.observer {
            observer.write_failed(&point);
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let RecorderState::Configured(active) = state {
            if let Some(timer) = active.timer.take() {
                self.scheduler.cancel(timer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::scheduler::ManualScheduler;
    use crate::recording::source::LiveValue;
    use crate::series::{Quality, ReadOnlyTimeSeries, Schedule, SeriesAccess, ValueKind};

    struct Fixture {
        source: Arc<LiveValue>,
        series: Arc<Schedule>,
        scheduler: Arc<ManualScheduler>,
        recorder: Arc<Recorder>,
    }

    fn fixture(initial: Value) -> Fixture {
        let source = Arc::new(LiveValue::new(initial.clone()));
        let series = Arc::new(Schedule::new("recorded", initial.kind()));
        let scheduler = Arc::new(ManualScheduler::new(1_000));
        let recorder = Recorder::new(source.clone(), series.clone(), scheduler.clone());
        Fixture {
            source,
            series,
            scheduler,
            recorder,
        }
    }

    #[derive(Default)]
    struct FailureLog {
        points: Mutex<Vec<SampledPoint>>,
    }

    impl RecordingObserver for FailureLog {
        fn write_failed(&self, point: &SampledPoint) {
            self.points.lock().unwrap().push(point.clone());
        }
    }

    #[test]
    fn test_disabled_recorder_ignores_events() {
        let f = fixture(Value::Float(1.0));
        f.recorder.on_value_changed(2_000);

        assert!(f.series.is_empty());
        assert!(!f.recorder.is_enabled());
        assert_eq!(f.recorder.stats().ignored_events, 1);
    }

    #[test]
    fn test_on_value_changed_seeds_and_deduplicates() {
        let f = fixture(Value::Float(1.0));
        f.recorder
            .configure(Some(RecordingConfig::on_value_changed()))
            .unwrap();

        // Seed write at scheduler time
        assert_eq!(f.series.size(), 1);
        assert_eq!(f.series.value_at(1_000).unwrap().value, Value::Float(1.0));

        f.source.set(Value::Float(2.0));
        f.recorder.on_value_changed(2_000);
        f.recorder.on_value_changed(3_000);
        f.source.set(Value::Float(1.0));
        f.recorder.on_value_changed(4_000);

        let stamps: Vec<i64> = f.series.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1_000, 2_000, 4_000]);
        assert_eq!(f.recorder.stats().points_written, 3);
    }

    #[test]
    fn test_on_value_update_writes_every_event() {
        let f = fixture(Value::Integer(5));
        f.recorder
            .configure(Some(RecordingConfig::on_value_update()))
            .unwrap();
        assert!(f.series.is_empty());

        f.recorder.on_value_changed(10);
        f.recorder.on_value_changed(20);

        assert_eq!(f.series.size(), 2);
        assert_eq!(f.series.value_at(20).unwrap().value, Value::Integer(5));
    }

    #[test]
    fn test_on_value_changed_distinct_values() {
        let f = fixture(Value::Boolean(false));
        f.recorder
            .configure(Some(RecordingConfig::on_value_changed()))
            .unwrap();
        f.recorder.on_value_changed(1_000);
        assert_eq!(f.series.size(), 1);

        f.source.set(Value::Boolean(true));
        f.recorder.on_value_changed(2_000);
        assert_eq!(f.series.size(), 2);
    }

    #[tokio::test]
    async fn test_events_from_channel() {
        let f = fixture(Value::Integer(1));
        f.recorder
            .configure(Some(RecordingConfig::on_value_update()))
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(Arc::clone(&f.recorder).run(rx));
        for time in [10, 20, 30] {
            tx.send(RecordingEvent::ValueChanged { time }).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(f.series.size(), 3);
    }

    #[test]
    fn test_fixed_interval_ticks() {
        let f = fixture(Value::Double(3.0));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(100)))
            .unwrap();

        f.recorder.on_value_changed(1_050);
        assert_eq!(f.scheduler.advance(500), 5);

        let stamps: Vec<i64> = f.series.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1_100, 1_200, 1_300, 1_400, 1_500]);
        assert!(f.series.iter().all(|p| p.quality == Quality::Good));
        assert_eq!(f.recorder.stats().ignored_events, 1);
    }

    #[test]
    fn test_fixed_interval_skips_inactive_source() {
        let f = fixture(Value::Double(3.0));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(100)))
            .unwrap();

        f.source.set_active(false);
        f.scheduler.advance(200);
        f.source.set_active(true);
        f.scheduler.advance(100);

        assert_eq!(f.series.size(), 1);
        assert_eq!(f.series.values_from(0)[0].timestamp, 1_300);
    }

    #[test]
    fn test_reconfigure_cancels_old_timer() {
        let f = fixture(Value::Long(7));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(100)))
            .unwrap();
        f.recorder
            .configure(Some(RecordingConfig::on_value_update()))
            .unwrap();

        assert_eq!(f.scheduler.active_timers(), 0);
        f.scheduler.advance(1_000);
        assert!(f.series.is_empty());
    }

    #[test]
    fn test_stale_tick_ignored() {
        let f = fixture(Value::Long(7));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(100)))
            .unwrap();

        f.recorder.on_interval_elapsed(999, 1_100);
        assert!(f.series.is_empty());
        assert_eq!(f.recorder.stats().ignored_events, 1);
    }

    #[test]
    fn test_detach_and_close() {
        let f = fixture(Value::Boolean(true));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(50)))
            .unwrap();
        f.recorder.configure(None).unwrap();

        assert!(!f.recorder.is_enabled());
        assert_eq!(f.scheduler.active_timers(), 0);

        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(50)))
            .unwrap();
        f.recorder.close();
        assert_eq!(f.scheduler.active_timers(), 0);
        f.scheduler.advance(500);
        assert!(f.series.is_empty());
    }

    #[test]
    fn test_drop_releases_timer() {
        let f = fixture(Value::Double(1.0));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(10)))
            .unwrap();
        assert_eq!(f.scheduler.active_timers(), 1);

        drop(f.recorder);
        assert_eq!(f.scheduler.active_timers(), 0);
    }

    #[test]
    fn test_unsupported_kind_rejected_at_configuration() {
        let f = fixture(Value::String("idle".into()));
        let err = f
            .recorder
            .configure(Some(RecordingConfig::on_value_update()))
            .unwrap_err();

        assert_eq!(err, RecordingError::UnsupportedValueType(ValueKind::String));
        assert!(!f.recorder.is_enabled());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let source = Arc::new(LiveValue::new(Value::Float(1.0)));
        let series = Arc::new(Schedule::new("doubles", ValueKind::Double));
        let scheduler = Arc::new(ManualScheduler::new(0));
        let recorder = Recorder::new(source, series, scheduler);

        assert!(matches!(
            recorder.configure(Some(RecordingConfig::on_value_changed())),
            Err(RecordingError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_config_keeps_previous_policy() {
        let f = fixture(Value::Double(1.0));
        f.recorder
            .configure(Some(RecordingConfig::fixed_interval(100)))
            .unwrap();

        assert!(f
            .recorder
            .configure(Some(RecordingConfig::fixed_interval(-5)))
            .is_err());
        assert_eq!(f.recorder.config(), Some(RecordingConfig::fixed_interval(100)));
        assert_eq!(f.scheduler.active_timers(), 1);
    }

    #[test]
    fn test_failed_writes_reported_and_timer_survives() {
        let source = Arc::new(LiveValue::new(Value::Double(1.0)));
        let series = Arc::new(Schedule::new("locked", ValueKind::Double));
        let scheduler = Arc::new(ManualScheduler::new(0));
        let observer = Arc::new(FailureLog::default());
        let recorder = Recorder::with_observer(
            source,
            series.clone(),
            scheduler.clone(),
            observer.clone(),
        );

        recorder
            .configure(Some(RecordingConfig::fixed_interval(10)))
            .unwrap();
        series.set_access(SeriesAccess::ReadOnly);
        scheduler.advance(20);
        series.set_access(SeriesAccess::Writable);
        scheduler.advance(10);

        let stats = recorder.stats();
        assert_eq!(stats.failed_writes, 2);
        assert_eq!(stats.points_written, 1);
        assert_eq!(observer.points.lock().unwrap().len(), 2);
        assert_eq!(series.size(), 1);
    }
}
