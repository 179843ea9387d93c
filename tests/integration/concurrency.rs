//! Concurrency limit integration tests.
//!
//! Tests that running jobs never exceed their group's limit, that groups do
//! not affect one another, and that the least recently started job is
//! preferred when a slot frees up.

use jobtick::testing::CountingWork;
use jobtick::{ConcurrencyKey, JobOptions, Scheduler};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{add_counting_job, record_events};

#[tokio::test(start_paused = true)]
async fn test_group_limit_caps_overlap() {
    let scheduler = Scheduler::new();
    scheduler.set_concurrency("batch", 2);

    // One work shared by every job, so its overlap is the group's overlap.
    let work = Arc::new(CountingWork::new().with_delay(Duration::from_millis(2500)));
    for _ in 0..5 {
        scheduler
            .add_job(
                JobOptions::with_shared_work("batch", "PT1S", work.clone()),
                Value::Null,
            )
            .unwrap();
    }

    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let running = scheduler.list_jobs().iter().filter(|j| j.running).count();
    assert_eq!(running, 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(work.max_in_flight(), 2);
    assert!(work.call_count() >= 6);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_groups_are_independent() {
    let scheduler = Scheduler::new();
    let blocked = CountingWork::new().with_delay(Duration::from_secs(60));
    add_counting_job(&scheduler, "slow", "PT1S", blocked);
    let (_, waiting) = add_counting_job(&scheduler, "slow", "PT1S", CountingWork::new());
    let (_, other) = add_counting_job(&scheduler, "fast", "PT1S", CountingWork::new());

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(3050)).await;

    // "slow" is held by the first job for a minute.
    assert_eq!(waiting.call_count(), 0);
    assert_eq!(other.call_count(), 3);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_least_recently_started_goes_next() {
    let scheduler = Scheduler::new();
    let (a_id, a) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());
    let (b_id, b) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());
    let (c_id, c) = add_counting_job(&scheduler, "g", "PT1S", CountingWork::new());
    let events = record_events(&scheduler).await;

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(6050)).await;

    let order: Vec<_> = events
        .events()
        .await
        .into_iter()
        .filter(|e| e.kind() == "job_started")
        .map(|e| e.job().id.clone())
        .collect();
    assert_eq!(
        order,
        vec![
            a_id.clone(),
            b_id.clone(),
            c_id.clone(),
            a_id,
            b_id,
            c_id
        ]
    );
    assert_eq!((a.call_count(), b.call_count(), c.call_count()), (2, 2, 2));

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_raising_limit_takes_effect_next_tick() {
    let scheduler = Scheduler::new();
    let hold = || CountingWork::new().with_delay(Duration::from_secs(60));
    let jobs: Vec<_> = (0..3)
        .map(|_| add_counting_job(&scheduler, "g", "PT1S", hold()))
        .collect();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let started: usize = jobs.iter().map(|(_, w)| w.call_count()).sum();
    assert_eq!(started, 1);

    scheduler.set_concurrency("g", 3);
    assert_eq!(scheduler.concurrency(&ConcurrencyKey::new("g")), 3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let started: usize = jobs.iter().map(|(_, w)| w.call_count()).sum();
    assert_eq!(started, 3);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_zero_limit_restores_default() {
    let scheduler = Scheduler::new();
    scheduler.set_concurrency("g", 4);
    scheduler.set_concurrency("g", 0);
    assert_eq!(scheduler.concurrency(&ConcurrencyKey::new("g")), 1);

    let hold = || CountingWork::new().with_delay(Duration::from_secs(60));
    let jobs: Vec<_> = (0..2)
        .map(|_| add_counting_job(&scheduler, "g", "PT1S", hold()))
        .collect();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2050)).await;

    let started: usize = jobs.iter().map(|(_, w)| w.call_count()).sum();
    assert_eq!(started, 1);

    scheduler.stop();
}
