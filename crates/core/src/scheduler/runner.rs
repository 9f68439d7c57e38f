//! The scheduling tick.
//!
//! One tick refreshes the job registry from the process table, re-reads
//! every job's phase and makes one archive decision. Ticks are synchronous;
//! the caller decides how often to run them.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveLauncher, ArchiveOutcome, ArchiveSpaceProbe, TransferSpawner};
use crate::config::Config;
use crate::disk::DiskSpace;
use crate::job::{Job, JobRegistry};
use crate::metrics;
use crate::process::ProcessDirectory;

use super::types::{JobAction, SchedulerError, TickReport};

/// Owns the job registry and the archive launcher.
pub struct Scheduler {
    processes: Arc<dyn ProcessDirectory>,
    registry: JobRegistry,
    launcher: ArchiveLauncher,
}

impl Scheduler {
    pub fn new(
        config: &Config,
        processes: Arc<dyn ProcessDirectory>,
        disk: Arc<dyn DiskSpace>,
        probe: Arc<dyn ArchiveSpaceProbe>,
        spawner: Arc<dyn TransferSpawner>,
    ) -> Self {
        let launcher = ArchiveLauncher::new(config, processes.clone(), disk, probe, spawner);
        Self {
            processes,
            registry: JobRegistry::from_config(config),
            launcher,
        }
    }

    /// Rescans the process table and refreshes every job's phase.
    pub fn refresh_jobs(&mut self) -> Result<Vec<Job>, SchedulerError> {
        self.registry.scan(self.processes.as_ref())?;
        self.registry.refresh_phases();
        let jobs = self.registry.jobs();
        record_job_metrics(&jobs);
        Ok(jobs)
    }

    /// Runs one full tick.
    pub fn tick(&mut self) -> Result<TickReport, SchedulerError> {
        let started = Instant::now();
        let result = self.run_tick();
        let label = if result.is_ok() { "success" } else { "error" };
        metrics::TICK_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::TICK_ERRORS.inc();
        }
        result
    }

    fn run_tick(&mut self) -> Result<TickReport, SchedulerError> {
        let jobs = self.refresh_jobs()?;
        let outcome = self.launcher.tick(&jobs)?;
        record_archive_metrics(&outcome);
        debug!(jobs = jobs.len(), archive = %outcome.status(), "tick complete");

        let summaries = jobs.iter().map(Job::summary).collect();
        Ok(TickReport::new(summaries, outcome))
    }

    /// Suspends, resumes or kills the one job whose plot id starts with
    /// `prefix`. Returns its pid.
    pub fn apply(&mut self, prefix: &str, action: JobAction) -> Result<u32, SchedulerError> {
        self.refresh_jobs()?;

        let pids = self.registry.pids_matching(prefix);
        let pid = match pids.as_slice() {
            [] => return Err(SchedulerError::NoMatchingJob(prefix.to_string())),
            [pid] => *pid,
            _ => {
                return Err(SchedulerError::AmbiguousPrefix {
                    prefix: prefix.to_string(),
                    count: pids.len(),
                })
            }
        };

        let processes = self.processes.clone();
        let job = self
            .registry
            .get_mut(pid)
            .ok_or_else(|| SchedulerError::NoMatchingJob(prefix.to_string()))?;
        match action {
            JobAction::Suspend => job.suspend(processes.as_ref(), "suspended by operator")?,
            JobAction::Resume => job.resume(processes.as_ref())?,
            JobAction::Kill => {
                // Stop it first so no new temp files appear while listing.
                job.suspend(processes.as_ref(), "killing")?;
                let temp_files = job.temp_files(processes.as_ref()).unwrap_or_else(|e| {
                    warn!(pid, error = %e, "cannot list temp files");
                    Vec::new()
                });
                job.cancel(processes.as_ref())?;
                for file in &temp_files {
                    match fs::remove_file(file) {
                        Ok(()) => debug!(pid, file = %file.display(), "removed temp file"),
                        Err(e) => warn!(pid, file = %file.display(), error = %e, "cannot remove temp file"),
                    }
                }
            }
        }
        info!(pid, plot_id = job.plot_id_prefix(), ?action, "job action applied");

        Ok(pid)
    }
}

fn record_job_metrics(jobs: &[Job]) {
    metrics::JOBS_RUNNING.set(jobs.len() as i64);

    let mut by_phase: BTreeMap<String, i64> = BTreeMap::new();
    for job in jobs {
        let label = if job.phase.is_known() {
            job.phase.major().to_string()
        } else {
            "unknown".to_string()
        };
        *by_phase.entry(label).or_default() += 1;
    }
    metrics::JOBS_BY_PHASE.reset();
    for (phase, count) in by_phase {
        metrics::JOBS_BY_PHASE.with_label_values(&[phase.as_str()]).set(count);
    }
}

fn record_archive_metrics(outcome: &ArchiveOutcome) {
    metrics::TRANSFERS_RUNNING.set(outcome.transfers().len() as i64);
    let label = match outcome {
        ArchiveOutcome::Launched { .. } => "launched",
        ArchiveOutcome::Skipped { .. } => "skipped",
        ArchiveOutcome::Refused { reason, .. } => reason.as_str(),
    };
    metrics::ARCHIVE_OUTCOMES.with_label_values(&[label]).inc();
}
