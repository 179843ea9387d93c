//! Scheduler type definitions.
//!
//! This module contains the error type and state enum for the scheduler.

use thiserror::Error;

use crate::core::interval::IntervalError;

/// Errors that can occur in the scheduler.
///
/// Failures of a job's work are never reported here; they are recorded on
/// the job and emitted as [`Event::JobFailed`](crate::events::Event::JobFailed).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A job interval did not parse.
    #[error(transparent)]
    InvalidDuration(#[from] IntervalError),

    /// `start` was called while the scheduler was already polling.
    #[error("scheduler already running")]
    AlreadyRunning,
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler is stopped.
    Stopped,
    /// Scheduler is running.
    Running,
}
