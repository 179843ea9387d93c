//! # jobtick
//!
//! An in-process scheduler for recurring jobs.
//!
//! Each job has an ISO-8601 interval, a concurrency key and some async work.
//! On every tick the scheduler starts the jobs that are due, never running
//! more jobs of one concurrency group at once than that group's limit
//! (default 1). Within a group, jobs that have never run go first, then the
//! least recently started.
//!
//! ```no_run
//! use jobtick::{JobOptions, JobSnapshot, Scheduler, work_fn};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), jobtick::SchedulerError> {
//! let scheduler = Scheduler::new();
//! scheduler.set_concurrency("reports", 2);
//!
//! scheduler.add_job(
//!     JobOptions::new(
//!         "reports",
//!         "PT5M",
//!         work_fn(|job: JobSnapshot| async move { Ok(json!({ "saw": job.data })) }),
//!     ),
//!     json!({ "region": "eu" }),
//! )?;
//!
//! scheduler.start()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod registry;
pub mod scheduler;
pub mod testing;

pub use core::clock::{Clock, ManualClock, MonotonicClock};
pub use core::interval::{Interval, IntervalError};
pub use core::job::{JobOptions, JobOutcome, JobSnapshot};
pub use core::types::{ConcurrencyKey, JobId};
pub use core::work::{Work, WorkFn, WorkResult, work_fn};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{CommandWork, CommandWorkBuilder};
pub use registry::JobRegistry;
pub use scheduler::{
    ConcurrencyLimits, DEFAULT_CONCURRENCY, LoggingHandler, Scheduler, SchedulerError,
    SchedulerState, plan_admissions,
};
