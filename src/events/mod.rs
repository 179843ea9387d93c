//! Lifecycle events and event handling.
//!
//! The scheduler emits an [`Event`] when a job starts, completes or fails.
//! Each event carries a [`JobSnapshot`] taken at that moment.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::core::job::JobSnapshot;

/// Lifecycle events emitted during job execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// A job has started execution.
    JobStarted {
        job: JobSnapshot,
        timestamp: Instant,
    },

    /// A job's work returned successfully.
    JobCompleted {
        job: JobSnapshot,
        timestamp: Instant,
    },

    /// A job's work failed. The failure payload is in `job.last_result`.
    JobFailed {
        job: JobSnapshot,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::JobStarted { timestamp, .. } => *timestamp,
            Event::JobCompleted { timestamp, .. } => *timestamp,
            Event::JobFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job snapshot carried by the event.
    pub fn job(&self) -> &JobSnapshot {
        match self {
            Event::JobStarted { job, .. } => job,
            Event::JobCompleted { job, .. } => job,
            Event::JobFailed { job, .. } => job,
        }
    }

    /// Short name of the event kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::JobStarted { .. } => "job_started",
            Event::JobCompleted { .. } => "job_completed",
            Event::JobFailed { .. } => "job_failed",
        }
    }

    /// Create a JobStarted event.
    pub fn job_started(job: JobSnapshot) -> Self {
        Event::JobStarted {
            job,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobCompleted event.
    pub fn job_completed(job: JobSnapshot) -> Self {
        Event::JobCompleted {
            job,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobFailed event.
    pub fn job_failed(job: JobSnapshot) -> Self {
        Event::JobFailed {
            job,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
///
/// Handlers are awaited one after another in registration order. A handler
/// that panics is logged and skipped; the remaining handlers still run.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await.clone();
        for handler in handlers.iter() {
            let delivered = AssertUnwindSafe(handler.handle(&event))
                .catch_unwind()
                .await;
            if delivered.is_err() {
                tracing::warn!(
                    job_id = %event.job().id,
                    event = event.kind(),
                    "Event handler panicked"
                );
            }
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
