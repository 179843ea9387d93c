//! Built-in job work.
//!
//! This module provides [`CommandWork`] for running external programs.

mod command;

pub use command::{CommandWork, CommandWorkBuilder, JOB_DATA_ENV, JOB_ID_ENV};
