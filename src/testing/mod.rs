//! Testing utilities for users of the jobtick library.
//!
//! This module provides helpers for testing scheduled jobs:
//!
//! - [`CountingWork`]: Work that counts its runs and can fail on demand
//! - [`RecordingHandler`]: An event handler that keeps every event it sees

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::core::job::JobSnapshot;
use crate::core::types::JobId;
use crate::core::work::{Work, WorkResult};
use crate::events::{Event, EventHandler};

/// Work that counts its runs.
///
/// Fails the first `fail_count` runs with the configured error value, then
/// succeeds with the configured result. Share it with
/// [`JobOptions::with_shared_work`](crate::JobOptions::with_shared_work) to
/// inspect it after the scheduler has run it.
///
/// ```
/// use jobtick::testing::CountingWork;
/// use jobtick::JobOptions;
/// use std::sync::Arc;
///
/// // Fails 2 times, then succeeds on the 3rd run
/// let work = Arc::new(CountingWork::failing(2, "boom"));
/// let _options = JobOptions::with_shared_work("group", "PT1S", work.clone());
/// assert_eq!(work.call_count(), 0);
/// ```
pub struct CountingWork {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    state: Mutex<CountingWorkState>,
    result: Value,
    error: Value,
    delay: Option<Duration>,
}

struct CountingWorkState {
    failures_remaining: usize,
    seen: Vec<(JobId, Value)>,
}

impl CountingWork {
    /// Create work that always succeeds.
    pub fn new() -> Self {
        Self::failing(0, Value::Null)
    }

    /// Create work that fails `fail_count` times with `error`, then succeeds.
    pub fn failing(fail_count: usize, error: impl Into<Value>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            state: Mutex::new(CountingWorkState {
                failures_remaining: fail_count,
                seen: Vec::new(),
            }),
            result: json!("ok"),
            error: error.into(),
            delay: None,
        }
    }

    /// Set the value returned on success.
    pub fn with_result(mut self, result: impl Into<Value>) -> Self {
        self.result = result.into();
        self
    }

    /// Sleep for `delay` inside every run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of runs started.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of runs observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Job ids and data seen by each run, in start order.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn seen(&self) -> Vec<(JobId, Value)> {
        self.state.lock().await.seen.clone()
    }
}

impl Default for CountingWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Work for CountingWork {
    async fn run(&self, job: JobSnapshot) -> WorkResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let fail = {
            let mut state = self.state.lock().await;
            state.seen.push((job.id.clone(), job.data.clone()));
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                true
            } else {
                false
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if fail {
            Err(self.error.clone())
        } else {
            Ok(self.result.clone())
        }
    }
}

/// Event handler that records every event.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in emission order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Kinds of all recorded events, in emission order.
    pub async fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(Event::kind).collect()
    }

    /// Number of recorded events of one kind.
    pub async fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }

    /// Events concerning one job.
    pub async fn events_for(&self, id: &JobId) -> Vec<Event> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| &e.job().id == id)
            .cloned()
            .collect()
    }

    /// Forget all recorded events.
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}
