//! Per-tick admission planning.
//!
//! Given a snapshot of every job, the configured group limits and the
//! current time, decide which jobs start on this tick. Planning is pure: it
//! reads snapshots and returns ids, leaving bookkeeping to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::job::JobSnapshot;
use crate::core::types::{ConcurrencyKey, JobId};

/// Limit applied to groups with no explicit setting.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Per-group concurrency limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    default: usize,
    per_key: HashMap<ConcurrencyKey, usize>,
}

impl ConcurrencyLimits {
    /// Limits where every group gets `default`.
    ///
    /// A default of zero falls back to [`DEFAULT_CONCURRENCY`].
    pub fn new(default: usize) -> Self {
        Self {
            default: if default == 0 {
                DEFAULT_CONCURRENCY
            } else {
                default
            },
            per_key: HashMap::new(),
        }
    }

    /// Set the limit for one group.
    ///
    /// A limit of zero clears the setting so the group uses the default.
    pub fn set(&mut self, key: ConcurrencyKey, limit: usize) {
        if limit == 0 {
            self.per_key.remove(&key);
        } else {
            self.per_key.insert(key, limit);
        }
    }

    /// The limit in force for a group.
    pub fn limit_for(&self, key: &ConcurrencyKey) -> usize {
        self.per_key.get(key).copied().unwrap_or(self.default)
    }

    /// The limit for groups with no explicit setting.
    pub fn default_limit(&self) -> usize {
        self.default
    }

    /// Explicitly configured groups.
    pub fn configured(&self) -> impl Iterator<Item = (&ConcurrencyKey, usize)> {
        self.per_key.iter().map(|(k, v)| (k, *v))
    }
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

/// Jobs sharing one concurrency key.
struct Group<'a> {
    jobs: Vec<&'a JobSnapshot>,
    running: usize,
}

/// Choose the jobs to start at `now`.
///
/// Jobs are grouped by concurrency key. Within a group, jobs that have never
/// run come first in registration order, followed by the rest from least to
/// most recently started. Admission walks that order, taking the first job
/// that is idle and due, until the group's running count reaches its limit.
/// Groups are independent; there is no global cap.
///
/// `jobs` must be in registration order, as returned by the registry.
pub fn plan_admissions(
    jobs: &[JobSnapshot],
    limits: &ConcurrencyLimits,
    now: DateTime<Utc>,
) -> Vec<JobId> {
    let mut index: HashMap<&ConcurrencyKey, usize> = HashMap::new();
    let mut groups: Vec<(&ConcurrencyKey, Group<'_>)> = Vec::new();

    for job in jobs {
        let slot = *index.entry(&job.concurrency_key).or_insert_with(|| {
            groups.push((
                &job.concurrency_key,
                Group {
                    jobs: Vec::new(),
                    running: 0,
                },
            ));
            groups.len() - 1
        });
        let group = &mut groups[slot].1;
        group.jobs.push(job);
        if job.running {
            group.running += 1;
        }
    }

    let mut admitted = Vec::new();
    for (key, group) in groups {
        admit_group(key, group, limits.limit_for(key), now, &mut admitted);
    }
    admitted
}

fn admit_group(
    key: &ConcurrencyKey,
    group: Group<'_>,
    limit: usize,
    now: DateTime<Utc>,
    admitted: &mut Vec<JobId>,
) {
    let (never_run, mut has_run): (Vec<&JobSnapshot>, Vec<&JobSnapshot>) =
        group.jobs.into_iter().partition(|j| j.last_started.is_none());
    has_run.sort_by_key(|j| j.last_started);

    let ordered: Vec<&JobSnapshot> = never_run.into_iter().chain(has_run).collect();
    let mut picked = vec![false; ordered.len()];
    let mut running = group.running;

    while running < limit {
        let next = ordered
            .iter()
            .enumerate()
            .find(|(i, job)| !picked[*i] && job.is_due(now));
        let Some((i, job)) = next else {
            break;
        };
        picked[i] = true;
        running += 1;
        admitted.push(job.id.clone());
    }

    tracing::trace!(
        concurrency_key = %key,
        running,
        limit,
        "Planned group admissions"
    );
}
