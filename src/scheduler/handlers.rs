//! Event handlers shipped with the scheduler.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::types::JobId;
use crate::events::{Event, EventHandler};

/// Event handler that logs every lifecycle event through `tracing`.
///
/// Jobs can be given display names; unnamed jobs are logged by id only.
#[derive(Default)]
pub struct LoggingHandler {
    names: RwLock<HashMap<JobId, String>>,
}

impl LoggingHandler {
    /// Create a handler with no job names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a display name to a job.
    pub fn name_job(&self, id: JobId, name: impl Into<String>) {
        self.names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, name.into());
    }

    fn name_of(&self, id: &JobId) -> String {
        self.names
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        let job = event.job();
        let name = self.name_of(&job.id);
        match event {
            Event::JobStarted { .. } => {
                tracing::info!(
                    job_id = %job.id,
                    job = %name,
                    concurrency_key = %job.concurrency_key,
                    "Job started"
                );
            }
            Event::JobCompleted { .. } => {
                tracing::info!(
                    job_id = %job.id,
                    job = %name,
                    result = ?job.last_result_value(),
                    "Job completed"
                );
            }
            Event::JobFailed { .. } => {
                tracing::error!(
                    job_id = %job.id,
                    job = %name,
                    error = ?job.last_result_value(),
                    "Job failed"
                );
            }
        }
    }
}
