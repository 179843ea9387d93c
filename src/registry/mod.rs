//! Job registry.
//!
//! The registry is the authoritative set of job records. It validates
//! intervals on the way in, hands out independent snapshots on the way out,
//! and offers the engine atomic start/finish bookkeeping. It makes no
//! scheduling decisions.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::interval::{Interval, IntervalError};
use crate::core::job::{JobOptions, JobOutcome, JobRecord, JobSnapshot};
use crate::core::types::JobId;
use crate::core::work::Work;

/// In-memory job registry.
///
/// Thread-safe through a single `RwLock` over all records. Data is not
/// persisted across restarts.
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<JobId, JobRecord>,
    next_seq: u64,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    // Records are only mutated field-by-field under the lock, so a poisoned
    // lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a job and return its id.
    ///
    /// Fails without adding anything if the interval does not parse.
    pub fn add(&self, options: JobOptions, data: Value) -> Result<JobId, IntervalError> {
        let (concurrency_key, interval, work) = options.into_parts();
        let interval = Interval::parse(interval)?;

        let mut inner = self.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let record = JobRecord::new(seq, concurrency_key, interval, data, work);
        let id = record.state.id.clone();
        tracing::debug!(
            job_id = %id,
            concurrency_key = %record.state.concurrency_key,
            interval = %record.state.interval,
            data = %record.state.data,
            "Added job"
        );
        inner.jobs.insert(id.clone(), record);
        Ok(id)
    }

    /// Remove a job. Unknown ids are ignored.
    ///
    /// Returns whether a job was removed.
    pub fn remove(&self, id: &JobId) -> bool {
        match self.write().jobs.remove(id) {
            Some(record) => {
                tracing::debug!(
                    job_id = %id,
                    concurrency_key = %record.state.concurrency_key,
                    running = record.state.running,
                    "Removed job"
                );
                true
            }
            None => false,
        }
    }

    /// Replace a job's data. Unknown ids are ignored.
    pub fn update_data(&self, id: &JobId, data: Value) {
        if let Some(record) = self.write().jobs.get_mut(id) {
            record.state.data = data;
            tracing::debug!(job_id = %id, data = %record.state.data, "Updated job data");
        }
    }

    /// Replace a job's interval.
    ///
    /// Unknown ids are ignored without validating `interval`. For a known id
    /// an unparseable interval is rejected and the old one kept.
    pub fn update_interval(&self, id: &JobId, interval: &str) -> Result<(), IntervalError> {
        let mut inner = self.write();
        let Some(record) = inner.jobs.get_mut(id) else {
            return Ok(());
        };
        record.state.interval = Interval::parse(interval)?;
        tracing::debug!(job_id = %id, interval = %record.state.interval, "Updated job interval");
        Ok(())
    }

    /// Snapshot every job in insertion order.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let inner = self.read();
        let mut records: Vec<&JobRecord> = inner.jobs.values().collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter().map(JobRecord::snapshot).collect()
    }

    /// Snapshot one job.
    pub fn find(&self, id: &JobId) -> Option<JobSnapshot> {
        self.read().jobs.get(id).map(JobRecord::snapshot)
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    /// Whether the registry holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.read().jobs.is_empty()
    }

    /// Mark a job as started at `now`.
    ///
    /// Returns the post-start snapshot and the job's work, or `None` if the
    /// job is gone or already running.
    pub(crate) fn begin_run(
        &self,
        id: &JobId,
        now: DateTime<Utc>,
    ) -> Option<(JobSnapshot, Arc<dyn Work>)> {
        let mut inner = self.write();
        let record = inner.jobs.get_mut(id)?;
        if record.state.running {
            return None;
        }
        record.state.running = true;
        record.state.last_started = Some(now);
        Some((record.snapshot(), Arc::clone(&record.work)))
    }

    /// Store an execution outcome.
    ///
    /// Returns the updated snapshot, or `None` if the job was removed while
    /// it ran.
    pub(crate) fn record_outcome(&self, id: &JobId, outcome: JobOutcome) -> Option<JobSnapshot> {
        let mut inner = self.write();
        let record = inner.jobs.get_mut(id)?;
        record.state.apply_outcome(outcome);
        Some(record.snapshot())
    }

    /// Clear the running flag.
    pub(crate) fn finish_run(&self, id: &JobId) {
        if let Some(record) = self.write().jobs.get_mut(id) {
            record.state.running = false;
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
