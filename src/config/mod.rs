//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for scheduler settings and
//! command jobs.

mod builder;
mod error;
mod types;
mod yaml;

pub use builder::{ConfiguredScheduler, SchedulerBuilder};
pub use error::ConfigError;
pub use types::{JobConfig, SchedulerConfig};
pub use yaml::YamlLoader;
