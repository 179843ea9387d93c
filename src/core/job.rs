//! Job options, records and snapshots.
//!
//! A job pairs a piece of [`Work`] with the interval between its runs and
//! the concurrency group it belongs to. Callers never hold the live record;
//! they see [`JobSnapshot`]s, which are independent copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::interval::Interval;
use super::types::{ConcurrencyKey, JobId};
use super::work::{Work, WorkResult};

/// Options for registering a job.
///
/// The interval is kept as the caller's string and validated when the job
/// is added.
#[derive(Clone)]
pub struct JobOptions {
    concurrency_key: ConcurrencyKey,
    interval: String,
    work: Arc<dyn Work>,
}

impl JobOptions {
    /// Create options for a job.
    pub fn new(
        concurrency_key: impl Into<ConcurrencyKey>,
        interval: impl Into<String>,
        work: impl Work + 'static,
    ) -> Self {
        Self::with_shared_work(concurrency_key, interval, Arc::new(work))
    }

    /// Create options from work that is already shared.
    pub fn with_shared_work(
        concurrency_key: impl Into<ConcurrencyKey>,
        interval: impl Into<String>,
        work: Arc<dyn Work>,
    ) -> Self {
        Self {
            concurrency_key: concurrency_key.into(),
            interval: interval.into(),
            work,
        }
    }

    /// Get the concurrency key.
    pub fn concurrency_key(&self) -> &ConcurrencyKey {
        &self.concurrency_key
    }

    /// Get the unvalidated interval expression.
    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub(crate) fn into_parts(self) -> (ConcurrencyKey, String, Arc<dyn Work>) {
        (self.concurrency_key, self.interval, self.work)
    }
}

impl std::fmt::Debug for JobOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOptions")
            .field("concurrency_key", &self.concurrency_key)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Outcome of the most recent execution of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The work returned this value.
    Success(Value),
    /// The work failed with this payload.
    Failure(Value),
}

impl JobOutcome {
    /// The success value or failure payload.
    pub fn value(&self) -> &Value {
        match self {
            JobOutcome::Success(v) | JobOutcome::Failure(v) => v,
        }
    }

    /// Whether this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failure(_))
    }
}

impl From<WorkResult> for JobOutcome {
    fn from(result: WorkResult) -> Self {
        match result {
            Ok(value) => JobOutcome::Success(value),
            Err(payload) => JobOutcome::Failure(payload),
        }
    }
}

/// An immutable copy of a job's state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Unique job identifier.
    pub id: JobId,
    /// Concurrency group the job belongs to.
    pub concurrency_key: ConcurrencyKey,
    /// Minimum time between successive starts.
    pub interval: Interval,
    /// Caller-owned payload passed to the work.
    pub data: Value,
    /// Whether an execution is in flight.
    pub running: bool,
    /// Whether the most recent completed execution failed.
    pub errored: bool,
    /// When the most recent execution started.
    pub last_started: Option<DateTime<Utc>>,
    /// Result of the most recent completed execution.
    pub last_result: Option<JobOutcome>,
}

impl JobSnapshot {
    /// The last result value (success value or failure payload).
    pub fn last_result_value(&self) -> Option<&Value> {
        self.last_result.as_ref().map(JobOutcome::value)
    }

    /// Whether the job has ever been started.
    pub fn has_run(&self) -> bool {
        self.last_started.is_some()
    }

    /// Whether the job is due at `now`.
    ///
    /// A job is due if it has never started, or its interval has elapsed
    /// since the last start. Running jobs are never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.running {
            return false;
        }
        match self.last_started {
            None => true,
            Some(last) => self.interval.has_elapsed(last, now),
        }
    }

    /// Apply an execution outcome to this snapshot.
    pub(crate) fn apply_outcome(&mut self, outcome: JobOutcome) {
        self.errored = outcome.is_failure();
        self.last_result = Some(outcome);
    }
}

/// The live record held by the registry.
pub(crate) struct JobRecord {
    /// Insertion order within the registry.
    pub(crate) seq: u64,
    pub(crate) state: JobSnapshot,
    pub(crate) work: Arc<dyn Work>,
}

impl JobRecord {
    pub(crate) fn new(
        seq: u64,
        concurrency_key: ConcurrencyKey,
        interval: Interval,
        data: Value,
        work: Arc<dyn Work>,
    ) -> Self {
        Self {
            seq,
            state: JobSnapshot {
                id: JobId::new(),
                concurrency_key,
                interval,
                data,
                running: false,
                errored: false,
                last_started: None,
                last_result: None,
            },
            work,
        }
    }

    pub(crate) fn snapshot(&self) -> JobSnapshot {
        self.state.clone()
    }
}
