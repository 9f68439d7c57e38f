//! One archive decision per tick.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::command::TransferCommand;
use super::error::ArchiveError;
use super::exclusive::{archive_log_path, create_exclusive};
use super::plots::expected_plot_size;
use super::remote::ArchiveSpaceProbe;
use super::selector::select_plot;
use super::spawner::TransferSpawner;
use super::transfers::{detect_transfers, ArchiveTransfer};
use crate::config::{ArchiveConfig, Config};
use crate::disk::{DiskSpace, GB};
use crate::job::Job;
use crate::process::ProcessDirectory;

/// Ticks a launched transfer is counted before it shows up in the process
/// table. The launching tick is the first.
pub const PENDING_PLACEHOLDER_TICKS: u32 = 1;

/// Concurrency multiplier when the archive is on this host.
pub const LOCAL_TRANSFER_MULTIPLIER: usize = 3;

/// Archive directories must have this much more room than one plot.
const ARCHIVE_HEADROOM: f64 = 1.2;

/// Why no transfer was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    NotConfigured,
    ConcurrencyLimit,
    NoPlots,
    NoArchiveDirs,
    NoArchiveSpace,
}

impl RefusalReason {
    /// Short machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::NoPlots => "no_plots",
            Self::NoArchiveDirs => "no_archive_dirs",
            Self::NoArchiveSpace => "no_archive_space",
        }
    }
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotConfigured => "no archive settings configured",
            Self::ConcurrencyLimit => "transfer limit reached",
            Self::NoPlots => "no plots found",
            Self::NoArchiveDirs => "no free archive dirs found",
            Self::NoArchiveSpace => "no archive directories found with enough free space",
        };
        f.write_str(text)
    }
}

/// Why a chosen transfer was not started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The transfer log exists, so another scheduler already moves the plot.
    AlreadyInFlight { log: PathBuf },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInFlight { log } => write!(f, "archive log exists: {}", log.display()),
        }
    }
}

/// Result of one archive tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Refused {
        reason: RefusalReason,
        transfers: Vec<ArchiveTransfer>,
    },
    Skipped {
        reason: SkipReason,
        transfers: Vec<ArchiveTransfer>,
    },
    Launched {
        pid: u32,
        command: TransferCommand,
        transfers: Vec<ArchiveTransfer>,
    },
}

impl ArchiveOutcome {
    /// Transfers in flight as seen by this tick, placeholders included.
    pub fn transfers(&self) -> &[ArchiveTransfer] {
        match self {
            Self::Refused { transfers, .. }
            | Self::Skipped { transfers, .. }
            | Self::Launched { transfers, .. } => transfers,
        }
    }

    pub fn is_launched(&self) -> bool {
        matches!(self, Self::Launched { .. })
    }

    /// `pid: 12, <pending>` while transfers run, otherwise the refusal or
    /// skip reason.
    pub fn status(&self) -> String {
        match self {
            Self::Refused { reason, .. } if *reason != RefusalReason::ConcurrencyLimit => {
                reason.to_string()
            }
            Self::Skipped { reason, transfers } if transfers.is_empty() => reason.to_string(),
            other => {
                let pids: Vec<String> = other
                    .transfers()
                    .iter()
                    .map(|t| match t.pid {
                        Some(pid) => pid.to_string(),
                        None => "<pending>".to_string(),
                    })
                    .collect();
                format!("pid: {}", pids.join(", "))
            }
        }
    }
}

struct PendingLaunch {
    transfer: ArchiveTransfer,
    ticks_remaining: u32,
}

/// Picks and starts at most one transfer per tick.
pub struct ArchiveLauncher {
    archive: Option<ArchiveConfig>,
    log_dir: PathBuf,
    dst_dirs: Vec<PathBuf>,
    plot_size_class: u8,
    processes: Arc<dyn ProcessDirectory>,
    disk: Arc<dyn DiskSpace>,
    probe: Arc<dyn ArchiveSpaceProbe>,
    spawner: Arc<dyn TransferSpawner>,
    pending: Vec<PendingLaunch>,
}

impl ArchiveLauncher {
    pub fn new(
        config: &Config,
        processes: Arc<dyn ProcessDirectory>,
        disk: Arc<dyn DiskSpace>,
        probe: Arc<dyn ArchiveSpaceProbe>,
        spawner: Arc<dyn TransferSpawner>,
    ) -> Self {
        Self {
            archive: config.archive.clone(),
            log_dir: config.directories.log.clone(),
            dst_dirs: config.directories.dst_directories().to_vec(),
            plot_size_class: config.plotting.plot_size_class,
            processes,
            disk,
            probe,
            spawner,
            pending: Vec::new(),
        }
    }

    /// Maximum transfers allowed at once.
    pub fn ceiling(archive: &ArchiveConfig) -> usize {
        let base = archive.max_concurrent_transfer.unwrap_or(1).max(1);
        if archive.is_local() {
            base * LOCAL_TRANSFER_MULTIPLIER
        } else {
            base
        }
    }

    fn age_pending(&mut self) {
        for launch in &mut self.pending {
            launch.ticks_remaining = launch.ticks_remaining.saturating_sub(1);
        }
        self.pending.retain(|launch| launch.ticks_remaining > 0);
    }

    /// Runs one archive decision against the current job set.
    pub fn tick(&mut self, jobs: &[Job]) -> Result<ArchiveOutcome, ArchiveError> {
        self.age_pending();

        let Some(archive) = self.archive.clone() else {
            return Ok(ArchiveOutcome::Refused {
                reason: RefusalReason::NotConfigured,
                transfers: Vec::new(),
            });
        };

        let mut transfers = detect_transfers(self.processes.as_ref(), &archive)?;
        self.pending
            .retain(|launch| !transfers.iter().any(|t| t.plot == launch.transfer.plot));
        transfers.extend(self.pending.iter().map(|launch| launch.transfer.clone()));

        let refuse = |reason, transfers| Ok(ArchiveOutcome::Refused { reason, transfers });

        let ceiling = Self::ceiling(&archive);
        if transfers.len() >= ceiling {
            debug!(running = transfers.len(), ceiling, "transfer limit reached");
            return refuse(RefusalReason::ConcurrencyLimit, transfers);
        }

        let Some(candidate) = select_plot(
            &self.dst_dirs,
            jobs,
            &transfers,
            self.disk.as_ref(),
            self.plot_size_class,
        ) else {
            return refuse(RefusalReason::NoPlots, transfers);
        };

        let free = match self.probe.free_space(&archive) {
            Ok(free) => free,
            Err(e) => {
                warn!(host = %archive.rsyncd_host, error = %e, "archive space probe failed");
                Default::default()
            }
        };
        if free.is_empty() {
            return refuse(RefusalReason::NoArchiveDirs, transfers);
        }

        let needed = ARCHIVE_HEADROOM * expected_plot_size(self.plot_size_class) as f64;
        let available: Vec<(&String, &u64)> = free
            .iter()
            .filter(|(_, bytes)| **bytes as f64 >= needed)
            .collect();
        if available.is_empty() {
            return refuse(RefusalReason::NoArchiveSpace, transfers);
        }
        let (archive_dir, free_bytes) = available[archive.index.min(available.len() - 1)];
        info!(
            archive_dir = %archive_dir,
            free_gb = free_bytes / GB,
            "found archive dir"
        );

        let command = TransferCommand::new(&archive, &candidate.plot, archive_dir);
        let log_path = archive_log_path(&self.log_dir, &candidate.plot);
        let log = match create_exclusive(&log_path) {
            Ok(log) => log,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                info!(log = %log_path.display(), "archive log exists, transfer already started");
                return Ok(ArchiveOutcome::Skipped {
                    reason: SkipReason::AlreadyInFlight { log: log_path },
                    transfers,
                });
            }
            Err(source) => {
                return Err(ArchiveError::LogFile {
                    path: log_path,
                    source,
                })
            }
        };

        let pid = match self.spawner.spawn(&command, log) {
            Ok(pid) => pid,
            Err(source) => {
                // No transfer owns the log, so the plot stays eligible.
                if let Err(e) = fs::remove_file(&log_path) {
                    warn!(log = %log_path.display(), error = %e, "failed to remove archive log");
                }
                return Err(ArchiveError::Spawn {
                    plot: candidate.plot.clone(),
                    source,
                });
            }
        };
        info!(pid, priority = candidate.priority, "starting archive: {}", command);

        let placeholder = ArchiveTransfer::pending(candidate.plot.to_string_lossy());
        self.pending.push(PendingLaunch {
            transfer: placeholder.clone(),
            ticks_remaining: PENDING_PLACEHOLDER_TICKS,
        });
        transfers.push(placeholder);

        Ok(ArchiveOutcome::Launched {
            pid,
            command,
            transfers,
        })
    }
}
