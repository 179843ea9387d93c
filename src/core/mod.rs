//! Core types: identifiers, intervals, clocks, work and job snapshots.

pub mod clock;
pub mod interval;
pub mod job;
pub mod types;
pub mod work;
