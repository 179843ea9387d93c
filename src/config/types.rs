//! Configuration type definitions.
//!
//! This module contains the YAML structures for scheduler settings and the
//! command jobs it should run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::scheduler::DEFAULT_CONCURRENCY;

/// Scheduler configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds between admission passes.
    pub tick_interval_ms: u64,
    /// Limit for groups without an entry in `concurrency`.
    pub default_concurrency: usize,
    /// Per-group concurrency limits.
    pub concurrency: BTreeMap<String, usize>,
    /// Jobs to register.
    pub jobs: Vec<JobConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            default_concurrency: DEFAULT_CONCURRENCY,
            concurrency: BTreeMap::new(),
            jobs: Vec::new(),
        }
    }
}

/// A command job from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Display name, unique within the file.
    pub name: String,
    /// Concurrency group.
    pub concurrency_key: String,
    /// ISO-8601 duration between starts.
    pub interval: String,
    /// Program to execute.
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Data passed to every run.
    #[serde(default)]
    pub data: Value,
}
