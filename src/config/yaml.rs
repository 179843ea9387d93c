//! YAML configuration parsing.
//!
//! Parses scheduler settings and job definitions from YAML files.

use std::collections::HashSet;
use std::path::Path;

use crate::core::interval::Interval;

use super::error::ConfigError;
use super::types::{JobConfig, SchedulerConfig};

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load and validate a scheduler configuration from a file.
    pub fn load_config(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SchedulerConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Parse and validate a scheduler configuration from a YAML string.
    pub fn parse_config(yaml: &str) -> Result<SchedulerConfig, ConfigError> {
        let config: SchedulerConfig = serde_yaml::from_str(yaml)?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Validate a scheduler configuration.
    pub fn validate_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
        if config.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "tick_interval_ms must be greater than zero".into(),
            ));
        }

        if config.default_concurrency == 0 {
            return Err(ConfigError::InvalidConfig(
                "default_concurrency must be greater than zero".into(),
            ));
        }

        for (key, limit) in &config.concurrency {
            if *limit == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "concurrency limit for '{}' must be greater than zero",
                    key
                )));
            }
        }

        let mut names: HashSet<&str> = HashSet::new();
        for job in &config.jobs {
            Self::validate_job_config(job)?;
            if !names.insert(&job.name) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate job name: {}",
                    job.name
                )));
            }
        }

        Ok(())
    }

    fn validate_job_config(job: &JobConfig) -> Result<(), ConfigError> {
        if job.name.is_empty() {
            return Err(ConfigError::MissingField("name".into()));
        }

        if job.command.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "command (job '{}')",
                job.name
            )));
        }

        Interval::parse(&job.interval).map_err(|e| {
            ConfigError::InvalidConfig(format!("job '{}': {}", job.name, e))
        })?;

        if job.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(format!(
                "job '{}': timeout_secs cannot be zero",
                job.name
            )));
        }

        Ok(())
    }
}
