//! Periodic tick driver with stop control.
//!
//! The scheduler owns the [`RuleEngine`] and fires one tick per
//! `update_interval` against the [`SharedStore`]. After each tick it takes a
//! [`Snapshot`] and hands it to the [`Publisher`] collaborator.
//!
//! # Lifecycle
//!
//! `Idle -> Running -> Stopped`. [`UpdateScheduler::start`] consumes the idle
//! scheduler and returns a [`SchedulerHandle`]; stop requests are honoured
//! between ticks, so an in-flight tick always completes and publishes.
//!
//! # Locking
//!
//! The store's write lock is held for the whole tick and downgraded to a
//! read lock for the snapshot copy. Query readers see either the state
//! before a tick or after it, never in between.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::engine::{RuleEngine, TickReport};
use crate::store::{SharedStore, Snapshot};

/// Errors surfaced when collecting a scheduler run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The tick loop task panicked or was aborted.
    #[error("scheduler task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Receives one snapshot per completed tick.
///
/// Implementations must not block: the tick loop calls `publish` inline.
/// Anything slow belongs on a task of its own, fed through a channel.
pub trait Publisher: Send + Sync {
    /// Called after a tick completes.
    fn publish(&self, snapshot: Arc<Snapshot>);
}

/// A publisher that drops every snapshot.
pub struct NoOpPublisher;

impl Publisher for NoOpPublisher {
    fn publish(&self, _snapshot: Arc<Snapshot>) {}
}

/// Forwards each snapshot to several publishers, sharing one copy.
#[derive(Default)]
pub struct FanOut {
    targets: Vec<Arc<dyn Publisher>>,
}

impl FanOut {
    /// Create an empty fan-out.
    pub const fn new() -> Self {
        Self {
            targets: Vec::new(),
        }
    }

    /// Add a target.
    #[must_use]
    pub fn with(mut self, target: Arc<dyn Publisher>) -> Self {
        self.targets.push(target);
        self
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Publisher for FanOut {
    fn publish(&self, snapshot: Arc<Snapshot>) {
        for target in &self.targets {
            target.publish(Arc::clone(&snapshot));
        }
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// Lifecycle state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Built but not started.
    Idle,
    /// Ticking.
    Running,
    /// Finished; will not tick again.
    Stopped,
}

impl SchedulerState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEndReason {
    /// A stop was requested.
    Stopped,
    /// The configured tick limit was reached.
    MaxTicksReached,
}

/// Outcome of a scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Ticks executed during this run.
    pub total_ticks: u64,
    /// Report of the last tick, if any ran.
    pub last_report: Option<TickReport>,
}

/// Shared control state, readable from any task.
#[derive(Debug)]
pub struct SchedulerControl {
    state: AtomicU8,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    ticks: AtomicU64,
}

impl SchedulerControl {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SchedulerState::Idle.as_u8()),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            ticks: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Ask the loop to stop after the current tick. Idempotent.
    pub fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::AcqRel) {
            self.stop_notify.notify_one();
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Ticks completed so far.
    pub fn ticks_completed(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// An idle scheduler, ready to start.
pub struct UpdateScheduler<R = StdRng> {
    store: SharedStore,
    engine: RuleEngine<R>,
    publisher: Arc<dyn Publisher>,
    interval: Duration,
    max_ticks: u64,
    control: Arc<SchedulerControl>,
}

impl UpdateScheduler<StdRng> {
    /// Scheduler using the interval, tick limit, and seed from `config`.
    pub fn from_config(
        store: SharedStore,
        config: &GlobalConfig,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self::new(
            store,
            RuleEngine::from_config(config),
            publisher,
            config.update_interval(),
            config.max_ticks,
        )
    }
}

impl<R: Rng + Send + 'static> UpdateScheduler<R> {
    /// Scheduler ticking `engine` every `interval`; `max_ticks` of 0 means
    /// no limit.
    pub fn new(
        store: SharedStore,
        engine: RuleEngine<R>,
        publisher: Arc<dyn Publisher>,
        interval: Duration,
        max_ticks: u64,
    ) -> Self {
        Self {
            store,
            engine,
            publisher,
            interval,
            max_ticks,
            control: Arc::new(SchedulerControl::new()),
        }
    }

    /// Control state, available before the scheduler starts.
    pub fn control(&self) -> Arc<SchedulerControl> {
        Arc::clone(&self.control)
    }

    /// Spawn the tick loop onto the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let control = Arc::clone(&self.control);
        control.set_state(SchedulerState::Running);
        let task = tokio::spawn(self.run());
        SchedulerHandle { control, task }
    }

    /// Drive ticks until stopped or the tick limit is reached.
    ///
    /// [`start`](Self::start) spawns this; calling it directly runs the loop
    /// on the current task.
    pub async fn run(mut self) -> RunSummary {
        self.control.set_state(SchedulerState::Running);
        info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            max_ticks = self.max_ticks,
            "Scheduler starting"
        );

        let mut total_ticks: u64 = 0;
        let mut last_report: Option<TickReport> = None;

        let end_reason = loop {
            // --- Check stop request (before tick) ---
            if self.control.is_stop_requested() {
                info!("Stop requested");
                break RunEndReason::Stopped;
            }

            // --- Execute tick ---
            let (report, snapshot) = {
                let mut store = self.store.write().await;
                let report = self.engine.tick(&mut store);
                let store = store.downgrade();
                (report, Arc::new(Snapshot::capture(&store)))
            };
            total_ticks = total_ticks.saturating_add(1);
            self.control.record_tick();

            info!(
                tick = report.tick,
                items = report.items_visited,
                updated = report.fields_updated,
                skipped = report.skipped(),
                "Tick complete"
            );

            // --- Publish ---
            self.publisher.publish(snapshot);
            last_report = Some(report);

            // --- Check tick limit (after tick) ---
            if self.max_ticks > 0 && total_ticks >= self.max_ticks {
                info!(max_ticks = self.max_ticks, "Tick limit reached");
                break RunEndReason::MaxTicksReached;
            }

            // --- Sleep for tick interval ---
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.control.stop_notify.notified() => {}
            }
        };

        self.control.set_state(SchedulerState::Stopped);
        if total_ticks == 0 {
            warn!("Scheduler stopped with no ticks executed");
        }
        info!(reason = ?end_reason, total_ticks, "Scheduler stopped");
        RunSummary {
            end_reason,
            total_ticks,
            last_report,
        }
    }
}

/// A running scheduler.
pub struct SchedulerHandle {
    control: Arc<SchedulerControl>,
    task: JoinHandle<RunSummary>,
}

impl SchedulerHandle {
    /// Request a stop; the in-flight tick, if any, still completes.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    /// Shared control state.
    pub fn control(&self) -> Arc<SchedulerControl> {
        Arc::clone(&self.control)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.control.state()
    }

    /// Wait for the loop to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Join`] if the loop task panicked.
    pub async fn join(self) -> Result<RunSummary, SchedulerError> {
        Ok(self.task.await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use rand::SeedableRng;
    use serde_json::json;

    use super::*;
    use crate::config::{ConfigSource, load};

    #[derive(Default)]
    struct Recorder {
        snapshots: Mutex<Vec<Arc<Snapshot>>>,
    }

    impl Recorder {
        fn ticks(&self) -> Vec<u64> {
            self.snapshots.lock().unwrap().iter().map(|s| s.tick).collect()
        }
    }

    impl Publisher for Recorder {
        fn publish(&self, snapshot: Arc<Snapshot>) {
            self.snapshots.lock().unwrap().push(snapshot);
        }
    }

    const CONFIG: &str = r#"{
        "config": {"update_interval": 5},
        "collections": [{
            "name": "sensors",
            "items": [{
                "id": "temp-001",
                "value": 22.5,
                "update_rules": {"value": {"type": "random_float", "min_value": 15, "max_value": 30}}
            }]
        }]
    }"#;

    fn scheduler(max_ticks: u64, recorder: &Arc<Recorder>) -> (UpdateScheduler, SharedStore) {
        let (store, _) = load(ConfigSource::Json(CONFIG)).unwrap();
        let store = store.into_shared();
        let engine = RuleEngine::new(StdRng::seed_from_u64(1), 5.0);
        let publisher: Arc<dyn Publisher> = Arc::clone(recorder) as Arc<dyn Publisher>;
        let scheduler = UpdateScheduler::new(
            Arc::clone(&store),
            engine,
            publisher,
            Duration::from_secs(5),
            max_ticks,
        );
        (scheduler, store)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_tick_limit() {
        let recorder = Arc::new(Recorder::default());
        let (scheduler, store) = scheduler(3, &recorder);
        let handle = scheduler.start();
        let summary = handle.join().await.unwrap();

        assert_eq!(summary.end_reason, RunEndReason::MaxTicksReached);
        assert_eq!(summary.total_ticks, 3);
        assert_eq!(summary.last_report.unwrap().tick, 3);
        assert_eq!(recorder.ticks(), vec![1, 2, 3]);
        assert_eq!(store.read().await.tick(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_between_ticks() {
        let recorder = Arc::new(Recorder::default());
        let (scheduler, _store) = scheduler(0, &recorder);
        let control = scheduler.control();
        assert_eq!(control.state(), SchedulerState::Idle);

        let handle = scheduler.start();
        assert_eq!(handle.state(), SchedulerState::Running);

        // Ticks fire at t=0, 5, 10; the stop lands mid-sleep at t=12.
        tokio::time::sleep(Duration::from_secs(12)).await;
        handle.stop();
        handle.stop();
        let summary = handle.join().await.unwrap();

        assert_eq!(summary.end_reason, RunEndReason::Stopped);
        assert_eq!(summary.total_ticks, 3);
        assert_eq!(control.ticks_completed(), 3);
        assert_eq!(control.state(), SchedulerState::Stopped);
        assert_eq!(recorder.ticks().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_runs_no_ticks() {
        let recorder = Arc::new(Recorder::default());
        let (scheduler, store) = scheduler(0, &recorder);
        scheduler.control().request_stop();
        let summary = scheduler.run().await;

        assert_eq!(summary.total_ticks, 0);
        assert!(summary.last_report.is_none());
        assert!(recorder.ticks().is_empty());
        assert_eq!(store.read().await.tick(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_matches_store_after_tick() {
        let recorder = Arc::new(Recorder::default());
        let (scheduler, store) = scheduler(1, &recorder);
        scheduler.start().join().await.unwrap();

        let snapshot = Arc::clone(&recorder.snapshots.lock().unwrap()[0]);
        let guard = store.read().await;
        let live = guard.collection("sensors").unwrap();
        assert_eq!(snapshot.collections["sensors"], *live);
        let value = serde_json::to_value(&snapshot.collections["sensors"].items[0]).unwrap();
        assert!(value["value"].as_f64().is_some());
        assert_eq!(value["update_rules"]["value"]["type"], json!("random_float"));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_headless_without_consumers() {
        let (store, _) = load(ConfigSource::Json(CONFIG)).unwrap();
        let store = store.into_shared();
        let scheduler = UpdateScheduler::new(
            Arc::clone(&store),
            RuleEngine::new(StdRng::seed_from_u64(2), 5.0),
            Arc::new(NoOpPublisher),
            Duration::from_secs(5),
            2,
        );
        let summary = scheduler.start().join().await.unwrap();

        assert_eq!(summary.total_ticks, 2);
        assert_eq!(store.read().await.tick(), 2);
    }

    #[test]
    fn fan_out_shares_one_copy() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let fan = FanOut::new()
            .with(Arc::clone(&a) as Arc<dyn Publisher>)
            .with(Arc::clone(&b) as Arc<dyn Publisher>);
        assert_eq!(fan.len(), 2);

        let (store, _) = load(ConfigSource::Json(CONFIG)).unwrap();
        fan.publish(Arc::new(Snapshot::capture(&store)));

        let first = Arc::clone(&a.snapshots.lock().unwrap()[0]);
        let second = Arc::clone(&b.snapshots.lock().unwrap()[0]);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
