//! The unit of work a job runs.
//!
//! Implement [`Work`] directly, or wrap an async closure with [`work_fn`].
//!
//! # Example
//!
//! ```
//! use jobtick::{JobSnapshot, work_fn};
//! use serde_json::json;
//!
//! let work = work_fn(|job: JobSnapshot| async move {
//!     match job.data.get("region") {
//!         Some(region) => Ok(json!({ "synced": region })),
//!         None => Err(json!("missing region")),
//!     }
//! });
//! # let _ = work;
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use super::job::JobSnapshot;

/// Result of one execution of a job's work.
///
/// Both sides are arbitrary JSON values: the error side is the failure
/// payload recorded on the job, and need not be a structured error.
pub type WorkResult = Result<Value, Value>;

/// Asynchronous work invoked by the scheduler each time a job runs.
#[async_trait]
pub trait Work: Send + Sync {
    /// Run the work against the job's current snapshot.
    ///
    /// `job.running` is always true here.
    async fn run(&self, job: JobSnapshot) -> WorkResult;
}

/// [`Work`] backed by an async closure.
pub struct WorkFn<F> {
    f: F,
}

/// Wrap an async closure as [`Work`].
pub fn work_fn<F, Fut>(f: F) -> WorkFn<F>
where
    F: Fn(JobSnapshot) -> Fut + Send + Sync,
    Fut: Future<Output = WorkResult> + Send,
{
    WorkFn { f }
}

#[async_trait]
impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(JobSnapshot) -> Fut + Send + Sync,
    Fut: Future<Output = WorkResult> + Send,
{
    async fn run(&self, job: JobSnapshot) -> WorkResult {
        (self.f)(job).await
    }
}

impl<F> std::fmt::Debug for WorkFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkFn").finish_non_exhaustive()
    }
}
