//! Common test utilities shared across integration tests.

use jobtick::testing::{CountingWork, RecordingHandler};
use jobtick::{JobId, JobOptions, JobSnapshot, Scheduler};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Register a job backed by shared [`CountingWork`].
pub fn add_counting_job(
    scheduler: &Scheduler,
    key: &str,
    interval: &str,
    work: CountingWork,
) -> (JobId, Arc<CountingWork>) {
    let work = Arc::new(work);
    let id = scheduler
        .add_job(
            JobOptions::with_shared_work(key, interval, work.clone()),
            Value::Null,
        )
        .unwrap();
    (id, work)
}

/// Attach a fresh recorder to the scheduler's event bus.
pub async fn record_events(scheduler: &Scheduler) -> Arc<RecordingHandler> {
    let handler = Arc::new(RecordingHandler::new());
    scheduler.event_bus().register(handler.clone()).await;
    handler
}

/// Wait for a job snapshot to satisfy `predicate`, polling the scheduler.
///
/// This is more reliable than fixed sleeps since execution time can vary.
/// Polls every 10ms and times out after the specified duration.
///
/// # Panics
///
/// Panics if the timeout is reached first or the job disappears.
pub async fn wait_for_job(
    scheduler: &Scheduler,
    id: &JobId,
    timeout: Duration,
    predicate: impl Fn(&JobSnapshot) -> bool,
) -> JobSnapshot {
    let start = tokio::time::Instant::now();
    loop {
        let job = scheduler.find_job(id).expect("job is registered");
        if predicate(&job) {
            return job;
        }
        if start.elapsed() > timeout {
            panic!("Timeout waiting for job {}, current state: {:?}", id, job);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
