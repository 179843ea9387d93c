//! Scheduler engine for recurring jobs.
//!
//! This module provides the polling loop that admits due jobs within their
//! group's concurrency limit and runs them in the background.

mod admission;
mod engine;
mod handle;
mod handlers;
mod types;

pub use admission::{ConcurrencyLimits, DEFAULT_CONCURRENCY, plan_admissions};
pub use engine::{DEFAULT_TICK_INTERVAL, Scheduler};
pub use handlers::LoggingHandler;
pub use types::{SchedulerError, SchedulerState};
