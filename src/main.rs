//! jobtick - An in-process recurring job scheduler.
//!
//! Usage:
//!   jobtick run <config>       Run the scheduler with jobs from a config file
//!   jobtick validate <config>  Validate a config file without running
//!   jobtick list <config>      List jobs, groups and limits

use clap::{Parser, Subcommand};
use jobtick::config::{JobConfig, SchedulerBuilder, SchedulerConfig, YamlLoader};
use jobtick::{ConcurrencyKey, LoggingHandler};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// jobtick - An in-process recurring job scheduler
#[derive(Parser)]
#[command(name = "jobtick")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until Ctrl+C
    Run {
        /// Path to the scheduler YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Tick interval in milliseconds (overrides the config file)
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Validate a config file without running
    Validate {
        /// Path to the scheduler YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// List jobs, concurrency groups and limits
    List {
        /// Path to the scheduler YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, tick_ms } => {
            run_scheduler(config, tick_ms).await?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::List { config } => {
            list_jobs(config)?;
        }
    }

    Ok(())
}

/// Run the scheduler with jobs from a config file.
async fn run_scheduler(
    path: PathBuf,
    tick_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading config from: {}", path.display());

    let mut config = YamlLoader::load_config(&path)?;
    if let Some(ms) = tick_ms {
        config.tick_interval_ms = ms;
        YamlLoader::validate_config(&config)?;
    }

    if config.jobs.is_empty() {
        warn!("No jobs defined in {}", path.display());
        return Ok(());
    }

    let built = SchedulerBuilder::from_config(&config)?;
    let scheduler = built.scheduler;

    let logger = LoggingHandler::new();
    info!("Loaded {} job(s):", built.jobs.len());
    for (name, id) in &built.jobs {
        if let Some(job) = scheduler.find_job(id) {
            info!(
                "  - {} [{}] every {}",
                name, job.concurrency_key, job.interval
            );
        }
        logger.name_job(id.clone(), name);
    }
    scheduler.event_bus().register(Arc::new(logger)).await;

    info!(
        "Starting scheduler (tick interval: {}ms)...",
        config.tick_interval_ms
    );
    info!("Press Ctrl+C to stop");
    scheduler.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    scheduler.stop();

    let running: Vec<_> = scheduler
        .list_jobs()
        .into_iter()
        .filter(|j| j.running)
        .collect();
    if !running.is_empty() {
        warn!("{} job(s) still running at exit", running.len());
    }

    info!("Goodbye!");
    Ok(())
}

/// Validate a config file without running.
fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating config: {}", path.display());

    match YamlLoader::load_config(&path) {
        Ok(config) => {
            info!("All {} job(s) are valid:", config.jobs.len());
            for job in &config.jobs {
                info!("  - {} ({}): OK", job.name, job.interval);
            }
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// List jobs grouped by concurrency key.
fn list_jobs(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = YamlLoader::load_config(&path)?;

    if config.jobs.is_empty() {
        println!("No jobs defined in {}", path.display());
        return Ok(());
    }

    println!("Jobs in {}:", path.display());
    println!();
    println!("Tick interval: {}ms", config.tick_interval_ms);
    println!("Default concurrency: {}", config.default_concurrency);
    println!();

    for (key, jobs) in group_jobs(&config) {
        let limit = config
            .concurrency
            .get(key.as_str())
            .copied()
            .unwrap_or(config.default_concurrency);
        println!("Group: {} (limit {})", key, limit);

        for job in jobs {
            println!("  - {}", job.name);
            println!("      Interval: {}", job.interval);
            if job.args.is_empty() {
                println!("      Command: {}", job.command);
            } else {
                println!("      Command: {} {}", job.command, job.args.join(" "));
            }
            if let Some(secs) = job.timeout_secs {
                println!("      Timeout: {}s", secs);
            }
            if !job.data.is_null() {
                println!("      Data: {}", job.data);
            }
        }
        println!();
    }

    Ok(())
}

fn group_jobs(config: &SchedulerConfig) -> BTreeMap<ConcurrencyKey, Vec<&JobConfig>> {
    let mut groups: BTreeMap<ConcurrencyKey, Vec<_>> = BTreeMap::new();
    for job in &config.jobs {
        groups
            .entry(ConcurrencyKey::new(job.concurrency_key.as_str()))
            .or_default()
            .push(job);
    }
    groups
}
