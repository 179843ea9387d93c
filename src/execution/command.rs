//! External command work.
//!
//! [`CommandWork`] runs an external program each time its job is admitted.
//! The job id and data are exported to the process as `JOBTICK_JOB_ID` and
//! `JOBTICK_JOB_DATA` (compact JSON).
//!
//! # Result values
//!
//! A run that exits with status 0 succeeds with
//!
//! ```json
//! {"stdout": "...", "stderr": "...", "exit_code": 0}
//! ```
//!
//! A non-zero exit fails with the same shape. A run that could not be
//! started, or that hit its timeout, fails with `{"error": "..."}`.
//!
//! ```rust
//! use jobtick::CommandWork;
//! use std::time::Duration;
//!
//! let work = CommandWork::builder("./report.sh")
//!     .args(["--region", "eu"])
//!     .env("LOG_LEVEL", "info")
//!     .timeout(Duration::from_secs(60))
//!     .build();
//!
//! assert_eq!(work.program(), "./report.sh");
//! ```
//!
//! **Process termination**: on timeout the child is killed when its future
//! is dropped, without a grace period.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::job::JobSnapshot;
use crate::core::work::{Work, WorkResult};

/// Environment variable carrying the job id.
pub const JOB_ID_ENV: &str = "JOBTICK_JOB_ID";
/// Environment variable carrying the job data as JSON.
pub const JOB_DATA_ENV: &str = "JOBTICK_JOB_DATA";

/// Work that executes an external command.
#[derive(Debug, Clone)]
pub struct CommandWork {
    /// Program to execute
    program: String,
    /// Command arguments
    args: Vec<String>,
    /// Extra environment variables
    env: BTreeMap<String, String>,
    /// Working directory
    working_dir: Option<PathBuf>,
    /// Execution timeout
    timeout: Option<Duration>,
}

impl CommandWork {
    /// Create a new builder for command work.
    pub fn builder(program: impl Into<String>) -> CommandWorkBuilder {
        CommandWorkBuilder::new(program)
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the command arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the extra environment variables.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Get the timeout duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, job: &JobSnapshot) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(&self.env);
        cmd.env(JOB_ID_ENV, job.id.to_string());
        cmd.env(JOB_DATA_ENV, job.data.to_string());

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Work for CommandWork {
    async fn run(&self, job: JobSnapshot) -> WorkResult {
        let mut cmd = self.command(&job);

        let output = match self.timeout {
            Some(duration) => match timeout(duration, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    tracing::warn!(
                        job_id = %job.id,
                        program = %self.program,
                        timeout = ?duration,
                        "Command timed out"
                    );
                    return Err(json!({
                        "error": format!("command timed out after {:?}", duration)
                    }));
                }
            },
            None => cmd.output().await,
        };

        let output = output.map_err(|e| {
            tracing::warn!(
                job_id = %job.id,
                program = %self.program,
                error = %e,
                "Failed to spawn command"
            );
            json!({ "error": format!("failed to run '{}': {}", self.program, e) })
        })?;

        let code = output.status.code().unwrap_or(-1);
        let value = json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": code,
        });

        if output.status.success() {
            Ok(value)
        } else {
            Err(value)
        }
    }
}

/// Builder for creating `CommandWork` instances.
#[derive(Debug, Clone)]
pub struct CommandWorkBuilder {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandWorkBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a single environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Build the `CommandWork`.
    pub fn build(self) -> CommandWork {
        CommandWork {
            program: self.program,
            args: self.args,
            env: self.env,
            working_dir: self.working_dir,
            timeout: self.timeout,
        }
    }
}
