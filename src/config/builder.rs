//! Scheduler builder from YAML configuration.
//!
//! This module converts a [`SchedulerConfig`] into a configured [`Scheduler`]
//! with one [`CommandWork`] job per entry.

use std::path::Path;
use std::time::Duration;

use crate::core::job::JobOptions;
use crate::core::types::JobId;
use crate::execution::CommandWork;
use crate::scheduler::Scheduler;

use super::error::ConfigError;
use super::types::{JobConfig, SchedulerConfig};
use super::yaml::YamlLoader;

/// A scheduler built from configuration, with the ids assigned to its jobs.
pub struct ConfiguredScheduler {
    /// The stopped scheduler.
    pub scheduler: Scheduler,
    /// Job names and ids, in file order.
    pub jobs: Vec<(String, JobId)>,
}

/// Builder for creating a Scheduler from YAML configuration.
pub struct SchedulerBuilder;

impl SchedulerBuilder {
    /// Build a scheduler from a validated configuration.
    ///
    /// The scheduler is returned stopped.
    pub fn from_config(config: &SchedulerConfig) -> Result<ConfiguredScheduler, ConfigError> {
        let scheduler = Scheduler::new()
            .with_tick_interval(Duration::from_millis(config.tick_interval_ms))
            .with_default_concurrency(config.default_concurrency);

        for (key, limit) in &config.concurrency {
            scheduler.set_concurrency(key.as_str(), *limit);
        }

        let mut jobs = Vec::with_capacity(config.jobs.len());
        for job_config in &config.jobs {
            let options = JobOptions::new(
                job_config.concurrency_key.as_str(),
                job_config.interval.as_str(),
                Self::build_work(job_config),
            );
            let id = scheduler
                .add_job(options, job_config.data.clone())
                .map_err(|e| {
                    ConfigError::InvalidConfig(format!("job '{}': {}", job_config.name, e))
                })?;
            jobs.push((job_config.name.clone(), id));
        }

        Ok(ConfiguredScheduler { scheduler, jobs })
    }

    /// Load, validate and build in one step.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ConfiguredScheduler, ConfigError> {
        let config = YamlLoader::load_config(path)?;
        Self::from_config(&config)
    }

    fn build_work(config: &JobConfig) -> CommandWork {
        let mut builder = CommandWork::builder(&config.command)
            .args(config.args.iter().cloned())
            .envs(config.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(dir) = &config.working_dir {
            builder = builder.working_dir(dir);
        }

        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}
