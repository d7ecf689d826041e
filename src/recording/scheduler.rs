//! Timer schedulers driving fixed-interval recording
//!
//! The recorder never owns a thread. It registers a callback with a
//! `TimerScheduler` and cancels it on reconfiguration.
//!
//! - `ManualScheduler`: caller advances a virtual clock; used by tests and
//!   simulations
//! - `TokioScheduler`: one tokio interval task per timer

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Identifier of a registered timer
pub type TimerId = u64;

/// Invoked with the timer id and the tick time in epoch milliseconds
pub type TimerCallback = Arc<dyn Fn(TimerId, i64) + Send + Sync>;

/// Source of time and periodic callbacks
pub trait TimerScheduler: Send + Sync {
    /// Current time in epoch milliseconds
    fn now(&self) -> i64;

    /// Call `callback` every `interval_ms`, first one interval from now
    fn schedule(&self, interval_ms: i64, callback: TimerCallback) -> TimerId;

    /// Stop a timer. Unknown ids are ignored.
    fn cancel(&self, timer: TimerId);
}

struct ManualTimer {
    interval_ms: i64,
    next_due: i64,
    callback: TimerCallback,
}

struct ManualState {
    now: i64,
    next_id: TimerId,
    timers: BTreeMap<TimerId, ManualTimer>,
}

/// Deterministic scheduler with a caller-controlled clock
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new(start_ms: i64) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: start_ms,
                next_id: 1,
                timers: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the clock forward by `delta_ms`, firing every due tick
    pub fn advance(&self, delta_ms: i64) -> usize {
        let target = self.now().saturating_add(delta_ms);
        self.advance_to(target)
    }

    /// Move the clock to `target`, firing due ticks in time order.
    ///
    /// Callbacks run without the scheduler lock held. Returns the number of
    /// ticks fired.
    pub fn advance_to(&self, target: i64) -> usize {
        let mut fired = 0;
        loop {
            let (id, at, callback) = {
                let mut state = self.lock();
                let due = state
                    .timers
                    .iter()
                    .filter(|(_, t)| t.next_due <= target)
                    .min_by_key(|(id, t)| (t.next_due, **id))
                    .map(|(id, _)| *id);

                let Some(id) = due else {
                    state.now = state.now.max(target);
                    break;
                };
                let Some(timer) = state.timers.get_mut(&id) else {
                    break;
                };
                let at = timer.next_due;
                let callback = Arc::clone(&timer.callback);
                match at.checked_add(timer.interval_ms) {
                    Some(next) => timer.next_due = next,
                    None => {
                        // No further tick is representable
                        state.timers.remove(&id);
                        debug!("Timer {} reached the end of time", id);
                    }
                }
                state.now = at;
                (id, at, callback)
            };
            callback(id, at);
            fired += 1;
        }
        fired
    }

    /// Fire one timer immediately at the current time
    pub fn fire(&self, timer: TimerId) -> bool {
        let (now, callback) = {
            let state = self.lock();
            match state.timers.get(&timer) {
                Some(t) => (state.now, Arc::clone(&t.callback)),
                None => return false,
            }
        };
        callback(timer, now);
        true
    }

    pub fn active_timers(&self) -> usize {
        self.lock().timers.len()
    }
}

impl TimerScheduler for ManualScheduler {
    fn now(&self) -> i64 {
        self.lock().now
    }

    fn schedule(&self, interval_ms: i64, callback: TimerCallback) -> TimerId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let interval_ms = interval_ms.max(1);
        let next_due = state.now.saturating_add(interval_ms);
        state.timers.insert(
            id,
            ManualTimer {
                interval_ms,
                next_due,
                callback,
            },
        );
        id
    }

    fn cancel(&self, timer: TimerId) {
        self.lock().timers.remove(&timer);
    }
}

/// Scheduler backed by tokio interval tasks on a runtime handle
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TimerId, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Scheduler on the runtime of the calling context
    pub fn try_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<TimerId, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimerScheduler for TokioScheduler {
    fn now(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn schedule(&self, interval_ms: i64, callback: TimerCallback) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let period = Duration::from_millis(interval_ms.max(1) as u64);

        let task = self.handle.spawn(async move {
            let start = Instant::now();
            let base = Utc::now().timestamp_millis();
            let mut ticker = interval_at(start + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let tick = ticker.tick().await;
                let elapsed = tick.duration_since(start).as_millis() as i64;
                callback(id, base + elapsed);
            }
        });

        self.tasks().insert(id, task);
        debug!("Scheduled timer {} every {:?}", id, period);
        id
    }

    fn cancel(&self, timer: TimerId) {
        if let Some(task) = self.tasks().remove(&timer) {
            task.abort();
            debug!("Cancelled timer {}", timer);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks().drain() {
            task.abort();
        }
    }
}
