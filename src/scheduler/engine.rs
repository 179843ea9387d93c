//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Polling on a fixed tick
//! - Admitting due jobs within their group's concurrency limit
//! - Running admitted jobs without blocking the tick
//! - Recording results and emitting lifecycle events

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::core::clock::{Clock, MonotonicClock};
use crate::core::job::{JobOptions, JobOutcome, JobSnapshot};
use crate::core::types::{ConcurrencyKey, JobId};
use crate::core::work::Work;
use crate::events::{Event, EventBus};
use crate::registry::JobRegistry;

use super::admission::{ConcurrencyLimits, plan_admissions};
use super::handle::TickerHandle;
use super::types::{SchedulerError, SchedulerState};

/// Default period between admission passes.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state used by the tick loop and by running jobs.
#[derive(Clone)]
struct Engine {
    registry: Arc<JobRegistry>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    limits: Arc<RwLock<ConcurrencyLimits>>,
    /// Serializes admission passes.
    tick_lock: Arc<Mutex<()>>,
}

/// Recurring job scheduler.
///
/// Configure with the `with_*` methods before calling [`start`](Self::start).
/// Jobs may be added, updated and removed at any time.
pub struct Scheduler {
    engine: Engine,
    /// Period between admission passes.
    tick_interval: Duration,
    /// The running tick loop, if started.
    ticker: Mutex<Option<TickerHandle>>,
}

impl Scheduler {
    /// Create a stopped scheduler with default settings.
    pub fn new() -> Self {
        Self {
            engine: Engine {
                registry: Arc::new(JobRegistry::new()),
                event_bus: Arc::new(EventBus::new()),
                clock: Arc::new(MonotonicClock::new()),
                limits: Arc::new(RwLock::new(ConcurrencyLimits::default())),
                tick_lock: Arc::new(Mutex::new(())),
            },
            tick_interval: DEFAULT_TICK_INTERVAL,
            ticker: Mutex::new(None),
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.engine.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the time source used for due-checks and start timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.engine.clock = clock;
        self
    }

    /// Set the limit for groups without an explicit limit.
    pub fn with_default_concurrency(self, limit: usize) -> Self {
        {
            let mut limits = self.limits_mut();
            let mut replaced = ConcurrencyLimits::new(limit);
            for (key, value) in limits.configured() {
                replaced.set(key.clone(), value);
            }
            *limits = replaced;
        }
        self
    }

    fn limits_mut(&self) -> std::sync::RwLockWriteGuard<'_, ConcurrencyLimits> {
        self.engine
            .limits
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn ticker(&self) -> std::sync::MutexGuard<'_, Option<TickerHandle>> {
        self.ticker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.engine.event_bus
    }

    /// Get the tick interval.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Start polling.
    ///
    /// The first admission pass runs one tick interval after this call.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut ticker = self.ticker();
        if ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let engine = self.engine.clone();
        let period = self.tick_interval;
        let task = tokio::spawn(async move {
            engine.run(period, shutdown_rx).await;
        });

        *ticker = Some(TickerHandle { shutdown_tx, task });
        tracing::info!(tick_interval = ?period, "Job scheduler started");
        Ok(())
    }

    /// Stop polling.
    ///
    /// Jobs already running are left to finish on their own. Does nothing if
    /// the scheduler is stopped.
    pub fn stop(&self) {
        if let Some(ticker) = self.ticker().take() {
            ticker.stop();
            tracing::info!("Job scheduler stopped");
        }
    }

    /// Get the current scheduler state.
    pub fn state(&self) -> SchedulerState {
        match self.ticker().as_ref() {
            Some(t) if !t.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Check if the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Register a job.
    ///
    /// `data` is passed to the job's work on every run; use `Value::Null`
    /// for none. Fails with [`SchedulerError::InvalidDuration`] if the
    /// interval does not parse, in which case nothing is added.
    pub fn add_job(&self, options: JobOptions, data: Value) -> Result<JobId, SchedulerError> {
        Ok(self.engine.registry.add(options, data)?)
    }

    /// Remove a job. Unknown ids are ignored.
    ///
    /// If the job is running, the execution finishes but its result is
    /// discarded.
    pub fn remove_job(&self, id: &JobId) {
        self.engine.registry.remove(id);
    }

    /// Replace a job's data. Unknown ids are ignored.
    pub fn update_job_data(&self, id: &JobId, data: Value) {
        self.engine.registry.update_data(id, data);
    }

    /// Replace a job's interval.
    ///
    /// Unknown ids are ignored. For a known job, an unparseable interval
    /// fails with [`SchedulerError::InvalidDuration`] and the old interval
    /// is kept.
    pub fn update_job_interval(&self, id: &JobId, interval: &str) -> Result<(), SchedulerError> {
        Ok(self.engine.registry.update_interval(id, interval)?)
    }

    /// Set how many jobs of a group may run at once.
    ///
    /// Takes effect from the next tick. A limit of zero restores the default.
    pub fn set_concurrency(&self, key: impl Into<ConcurrencyKey>, limit: usize) {
        let key = key.into();
        tracing::debug!(concurrency_key = %key, limit, "Set concurrency");
        self.limits_mut().set(key, limit);
    }

    /// The limit in force for a group.
    pub fn concurrency(&self, key: &ConcurrencyKey) -> usize {
        self.engine.limits().limit_for(key)
    }

    /// Snapshot all jobs in registration order.
    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.engine.registry.list()
    }

    /// Snapshot one job.
    pub fn find_job(&self, id: &JobId) -> Option<JobSnapshot> {
        self.engine.registry.find(id)
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.engine.registry.len()
    }

    /// Run one admission pass now and return the ids of jobs launched.
    ///
    /// This is what every tick does; calling it directly does not disturb
    /// the tick cadence. Must be called from within a tokio runtime.
    pub fn tick(&self) -> Vec<JobId> {
        self.engine.tick()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    fn limits(&self) -> ConcurrencyLimits {
        self.limits
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Main tick loop.
    async fn run(self, period: Duration, mut shutdown_rx: oneshot::Receiver<()>) {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                // A dropped sender also ends the loop.
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }
    }

    /// One admission pass.
    fn tick(&self) -> Vec<JobId> {
        let _guard = self.tick_lock.lock().unwrap_or_else(|e| e.into_inner());

        let now = self.clock.now();
        let jobs = self.registry.list();
        let plan = plan_admissions(&jobs, &self.limits(), now);

        let mut launched = Vec::with_capacity(plan.len());
        for id in plan {
            // The job may have been removed since the snapshot.
            let Some((snapshot, work)) = self.registry.begin_run(&id, now) else {
                continue;
            };
            let engine = self.clone();
            tokio::spawn(async move {
                engine.run_job(snapshot, work).await;
            });
            launched.push(id);
        }

        if !launched.is_empty() {
            tracing::debug!(
                jobs = jobs.len(),
                launched = launched.len(),
                "Tick admitted jobs"
            );
        }
        launched
    }

    /// Execute one admitted job and record its outcome.
    ///
    /// `snapshot` already has `running` set and `last_started` stamped.
    async fn run_job(self, snapshot: JobSnapshot, work: Arc<dyn Work>) {
        let id = snapshot.id.clone();
        tracing::debug!(
            job_id = %id,
            concurrency_key = %snapshot.concurrency_key,
            data = %snapshot.data,
            "Running job"
        );

        self.event_bus.emit(Event::job_started(snapshot.clone())).await;

        let outcome = invoke(work, snapshot.clone()).await;
        let failed = outcome.is_failure();

        let settled = match self.registry.record_outcome(&id, outcome.clone()) {
            Some(updated) => updated,
            None => {
                tracing::debug!(job_id = %id, "Job removed while running, discarding result");
                let mut orphan = snapshot;
                orphan.apply_outcome(outcome);
                orphan
            }
        };

        if failed {
            tracing::warn!(
                job_id = %id,
                concurrency_key = %settled.concurrency_key,
                last_result = ?settled.last_result_value(),
                "Job errored"
            );
            self.event_bus.emit(Event::job_failed(settled)).await;
        } else {
            tracing::debug!(
                job_id = %id,
                concurrency_key = %settled.concurrency_key,
                last_result = ?settled.last_result_value(),
                "Job completed"
            );
            self.event_bus.emit(Event::job_completed(settled)).await;
        }

        self.registry.finish_run(&id);
    }
}

/// Run the work, turning a panic into a failure payload.
async fn invoke(work: Arc<dyn Work>, job: JobSnapshot) -> JobOutcome {
    match AssertUnwindSafe(work.run(job)).catch_unwind().await {
        Ok(result) => JobOutcome::from(result),
        Err(panic) => JobOutcome::Failure(Value::String(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "work panicked".to_string()
    }
}
