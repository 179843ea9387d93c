//! Configuration-to-execution integration tests.
//!
//! Tests that a YAML file becomes a running scheduler whose command jobs
//! report their output as job results.

use jobtick::config::{ConfigError, SchedulerBuilder, YamlLoader};
use jobtick::{ConcurrencyKey, JobOutcome};
use serde_json::{Value, json};
use std::io::Write;
use std::time::Duration;

use crate::common::wait_for_job;

const CONFIG: &str = r#"
tick_interval_ms: 20
default_concurrency: 1
concurrency:
  shell: 2
jobs:
  - name: echo-data
    concurrency_key: shell
    interval: PT0.05S
    command: sh
    args: ["-c", "echo \"$JOBTICK_JOB_DATA\"; echo \"$GREETING\" >&2"]
    env:
      GREETING: hello
    data:
      region: eu
  - name: broken
    concurrency_key: shell
    interval: PT0.05S
    command: sh
    args: ["-c", "exit 3"]
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_yaml_jobs_run_commands() {
    let file = write_config(CONFIG);
    let built = SchedulerBuilder::from_file(file.path()).unwrap();
    let scheduler = built.scheduler;
    assert_eq!(scheduler.concurrency(&ConcurrencyKey::new("shell")), 2);

    let (name, echo_id) = &built.jobs[0];
    assert_eq!(name, "echo-data");
    let (_, broken_id) = &built.jobs[1];

    scheduler.start().unwrap();

    let echo = wait_for_job(&scheduler, echo_id, Duration::from_secs(10), |j| {
        j.last_result.is_some()
    })
    .await;
    let broken = wait_for_job(&scheduler, broken_id, Duration::from_secs(10), |j| {
        j.last_result.is_some()
    })
    .await;
    scheduler.stop();

    let Some(JobOutcome::Success(value)) = echo.last_result.clone() else {
        panic!("Expected success, got {:?}", echo.last_result);
    };
    let stdout: Value = serde_json::from_str(value["stdout"].as_str().unwrap().trim()).unwrap();
    assert_eq!(stdout, json!({ "region": "eu" }));
    assert_eq!(value["stderr"].as_str().unwrap().trim(), "hello");
    assert_eq!(value["exit_code"], 0);

    assert!(broken.errored);
    assert_eq!(broken.last_result_value().unwrap()["exit_code"], 3);
}

#[tokio::test]
async fn test_missing_program_becomes_job_failure() {
    let file = write_config(
        r#"
tick_interval_ms: 20
jobs:
  - name: ghost
    concurrency_key: g
    interval: PT1S
    command: /nonexistent/jobtick-missing
"#,
    );
    let built = SchedulerBuilder::from_file(file.path()).unwrap();
    let scheduler = built.scheduler;
    let id = built.jobs[0].1.clone();

    scheduler.start().unwrap();
    let job = wait_for_job(&scheduler, &id, Duration::from_secs(10), |j| j.errored).await;
    scheduler.stop();

    assert!(job.last_result_value().unwrap()["error"].is_string());
    assert!(!scheduler.is_running());
}

#[test]
fn test_invalid_file_is_rejected_before_building() {
    let file = write_config(
        r#"
jobs:
  - name: a
    concurrency_key: g
    interval: PT1S
    command: "true"
  - name: b
    concurrency_key: g
    interval: tomorrow
    command: "true"
"#,
    );

    let err = YamlLoader::load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
    assert!(SchedulerBuilder::from_file(file.path()).is_err());
}
