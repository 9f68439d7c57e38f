mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plotherd_core::archive::{DfSpaceProbe, DetachedSpawner};
use plotherd_core::job::JobSummary;
use plotherd_core::process::ProcfsDirectory;
use plotherd_core::{load_config, validate_config, Config, JobAction, Scheduler, StatvfsDisk};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "plotherd", version, about = "Plot job supervisor and archive scheduler")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "PLOTHERD_CONFIG", default_value = "plotherd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduling loop until interrupted
    Run,
    /// Print the running plot jobs as JSON
    Status,
    /// Run one tick and print its report as JSON
    Archive,
    /// Suspend the job whose plot id starts with PREFIX
    Suspend { prefix: String },
    /// Resume the job whose plot id starts with PREFIX
    Resume { prefix: String },
    /// Kill the job whose plot id starts with PREFIX and remove its temp files
    Kill { prefix: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let mut scheduler = build_scheduler(&config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_loop(config, scheduler).await,
        Command::Status => {
            let jobs = scheduler.refresh_jobs().context("Failed to scan plot jobs")?;
            let summaries: Vec<JobSummary> = jobs.iter().map(|job| job.summary()).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(())
        }
        Command::Archive => {
            let report = scheduler.tick().context("Archive tick failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Suspend { prefix } => apply(&mut scheduler, &prefix, JobAction::Suspend),
        Command::Resume { prefix } => apply(&mut scheduler, &prefix, JobAction::Resume),
        Command::Kill { prefix } => apply(&mut scheduler, &prefix, JobAction::Kill),
    }
}

fn build_scheduler(config: &Config) -> Scheduler {
    Scheduler::new(
        config,
        Arc::new(ProcfsDirectory::new()),
        Arc::new(StatvfsDisk),
        Arc::new(DfSpaceProbe),
        Arc::new(DetachedSpawner),
    )
}

fn apply(scheduler: &mut Scheduler, prefix: &str, action: JobAction) -> Result<()> {
    let pid = scheduler
        .apply(prefix, action)
        .with_context(|| format!("Failed to {:?} job {}", action, prefix))?;
    println!("{:?} pid {}", action, pid);
    Ok(())
}

/// Ticks every `polling_interval_secs` until ctrl-c or SIGTERM. Ticks run on
/// the blocking pool one at a time; shutdown is only observed between ticks.
async fn run_loop(config: Config, mut scheduler: Scheduler) -> Result<()> {
    let period = Duration::from_secs(config.scheduling.polling_interval_secs.max(1));
    let textfile = config.metrics.textfile_path.clone();
    info!(
        version = VERSION,
        interval_secs = period.as_secs(),
        archive = config.archive.is_some(),
        "plotherd started"
    );

    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping");
                break;
            }
            _ = interval.tick() => {
                let (returned, result) = tokio::task::spawn_blocking(move || {
                    let result = scheduler.tick();
                    (scheduler, result)
                })
                .await
                .context("Scheduler tick panicked")?;
                scheduler = returned;

                match result {
                    Ok(report) => info!(
                        jobs = report.jobs.len(),
                        transfers = report.transfers.len(),
                        archive = %report.archive_status,
                        "tick"
                    ),
                    Err(e) if e.is_fatal() => bail!(e),
                    Err(e) => warn!(error = %e, "tick failed"),
                }

                if let Some(path) = &textfile {
                    metrics::LAST_TICK_TIMESTAMP.set(unix_now());
                    if let Err(e) = metrics::write_textfile(path) {
                        warn!(path = %path.display(), error = %e, "cannot write metrics textfile");
                    }
                }
            }
        }
    }

    Ok(())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::try_parse_from(["plotherd", "--config", "/etc/plotherd.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/plotherd.toml"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_job_subcommands_take_prefix() {
        let cli = Cli::try_parse_from(["plotherd", "kill", "3fa9"]).unwrap();
        match cli.command {
            Some(Command::Kill { prefix }) => assert_eq!(prefix, "3fa9"),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["plotherd", "suspend"]).is_err());
    }

    #[test]
    fn test_status_and_archive_subcommands() {
        let cli = Cli::try_parse_from(["plotherd", "status"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Status)));

        let cli = Cli::try_parse_from(["plotherd", "archive"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Archive)));
    }
}
