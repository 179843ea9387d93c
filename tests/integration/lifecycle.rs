//! Job lifecycle integration tests.
//!
//! Tests adding, updating and removing jobs while the scheduler runs, and
//! stopping and restarting the scheduler itself.

use jobtick::testing::CountingWork;
use jobtick::{Interval, JobOptions, Scheduler, SchedulerError, SchedulerState};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{add_counting_job, record_events};

#[tokio::test(start_paused = true)]
async fn test_updated_data_reaches_next_run() {
    let scheduler = Scheduler::new();
    let work = Arc::new(CountingWork::new());
    let id = scheduler
        .add_job(
            JobOptions::with_shared_work("g", "PT1S", work.clone()),
            json!({ "version": 1 }),
        )
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;

    scheduler.update_job_data(&id, json!({ "version": 2 }));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let seen: Vec<Value> = work.seen().await.into_iter().map(|(_, d)| d).collect();
    assert_eq!(seen, vec![json!({ "version": 1 }), json!({ "version": 2 })]);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_updated_interval_changes_cadence() {
    let scheduler = Scheduler::new();
    let (id, work) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(work.call_count(), 1);

    scheduler.update_job_interval(&id, "PT5S").unwrap();
    assert_eq!(
        scheduler.find_job(&id).unwrap().interval,
        Interval::parse("PT5S").unwrap()
    );

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(work.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(work.call_count(), 2);

    scheduler.stop();
}

#[tokio::test]
async fn test_bad_interval_update_keeps_old_interval() {
    let scheduler = Scheduler::new();
    let (id, _) = add_counting_job(&scheduler, "g", "PT1M", CountingWork::new());

    let result = scheduler.update_job_interval(&id, "P1X");
    assert!(matches!(result, Err(SchedulerError::InvalidDuration(_))));
    assert_eq!(scheduler.find_job(&id).unwrap().interval.expression(), "PT1M");
}

#[tokio::test]
async fn test_unknown_ids_are_ignored() {
    let scheduler = Scheduler::new();
    let ghost = jobtick::JobId::new();

    scheduler.remove_job(&ghost);
    scheduler.update_job_data(&ghost, json!(1));
    assert!(scheduler.update_job_interval(&ghost, "PT1S").is_ok());
    assert!(scheduler.update_job_interval(&ghost, "garbage").is_ok());
    assert!(scheduler.find_job(&ghost).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_removed_job_stops_running() {
    let scheduler = Scheduler::new();
    let (id, work) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2050)).await;
    assert_eq!(work.call_count(), 2);

    scheduler.remove_job(&id);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(work.call_count(), 2);
    assert_eq!(scheduler.job_count(), 0);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_removed_while_running_finishes_quietly() {
    let scheduler = Scheduler::new();
    let (id, work) = add_counting_job(
        &scheduler,
        "g",
        "PT1S",
        CountingWork::new().with_delay(Duration::from_secs(2)),
    );
    let (_, sibling) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());
    let events = record_events(&scheduler).await;

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert!(scheduler.find_job(&id).unwrap().running);

    scheduler.remove_job(&id);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(work.call_count(), 1);
    assert!(scheduler.find_job(&id).is_none());
    assert!(sibling.call_count() >= 1);

    let for_removed = events.events_for(&id).await;
    let kinds: Vec<_> = for_removed.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, ["job_started", "job_completed"]);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_ticks_and_restart_resumes() {
    let scheduler = Scheduler::new();
    let (_, work) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(work.call_count(), 1);

    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(work.call_count(), 1);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(work.call_count(), 2);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_running_job_finish() {
    let scheduler = Scheduler::new();
    let (id, work) = add_counting_job(
        &scheduler,
        "g",
        "PT1S",
        CountingWork::new().with_delay(Duration::from_secs(3)),
    );
    let events = record_events(&scheduler).await;

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    scheduler.stop();
    assert!(scheduler.find_job(&id).unwrap().running);
    assert_eq!(events.kinds().await, ["job_started"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let job = scheduler.find_job(&id).unwrap();
    assert!(!job.running);
    assert_eq!(job.last_result_value(), Some(&json!("ok")));
    assert_eq!(work.call_count(), 1);
    assert_eq!(events.kinds().await, ["job_started", "job_completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_added_while_running_are_picked_up() {
    let scheduler = Scheduler::new();
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let (_, work) = add_counting_job(&scheduler, "late", "PT1H", CountingWork::new());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(work.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(work.call_count(), 1);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_event_order_for_one_run() {
    let scheduler = Scheduler::new();
    let (id, _) = add_counting_job(
        &scheduler,
        "g",
        "PT1M",
        CountingWork::failing(1, "first run fails"),
    );
    let events = record_events(&scheduler).await;

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;

    let recorded = events.events_for(&id).await;
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].kind(), "job_started");
    assert!(recorded[0].job().running);
    assert_eq!(recorded[1].kind(), "job_failed");
    assert!(recorded[1].job().errored);
    assert_eq!(
        recorded[1].job().last_result_value(),
        Some(&json!("first run fails"))
    );
    assert!(recorded[1].timestamp() >= recorded[0].timestamp());

    scheduler.stop();
}
