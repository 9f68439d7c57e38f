//! Discovery and caching of running plot jobs.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::command::{is_plotting_cmdline, PlotCommand};
use super::error::JobError;
use super::plot_job::Job;
use crate::config::Config;
use crate::phase::{parse_log_header, LogDialect, LogHeader};
use crate::process::{ProcessDirectory, ProcessError, ProcessInfo};

/// How hard to try reading a log header that may not be written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogReadPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LogReadPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl LogReadPolicy {
    /// Reads the policy from the scheduling section.
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.scheduling.log_read_attempts.max(1),
            delay: Duration::from_millis(config.scheduling.log_read_delay_ms),
        }
    }

    /// Reads `path` until the header is complete or attempts run out.
    pub fn read_header(&self, dialect: LogDialect, path: &Path) -> LogHeader {
        let mut header = LogHeader::default();
        for attempt in 1..=self.attempts.max(1) {
            match fs::read(path) {
                Ok(bytes) => {
                    header = parse_log_header(dialect, &String::from_utf8_lossy(&bytes));
                    if header.is_complete() {
                        break;
                    }
                }
                Err(e) => debug!(path = %path.display(), error = %e, "log not readable yet"),
            }
            if attempt < self.attempts && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        header
    }
}

/// Status-change time of a file, used when the log has no start marker.
fn ctime(path: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(path).ok()?;
    Utc.timestamp_opt(meta.ctime(), meta.ctime_nsec() as u32).single()
}

/// Running plot jobs keyed by pid.
///
/// Jobs already seen are kept as they are; only new pids are inspected, and
/// pids that left the process table are evicted on every scan.
pub struct JobRegistry {
    log_root: PathBuf,
    alternate_engine_name: String,
    log_policy: LogReadPolicy,
    jobs: BTreeMap<u32, Job>,
}

impl JobRegistry {
    pub fn new(
        log_root: impl Into<PathBuf>,
        alternate_engine_name: impl Into<String>,
        log_policy: LogReadPolicy,
    ) -> Self {
        Self {
            log_root: log_root.into(),
            alternate_engine_name: alternate_engine_name.into(),
            log_policy,
            jobs: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.directories.log,
            &config.plotting.alternate_engine_name,
            LogReadPolicy::from_config(config),
        )
    }

    /// Brings the cache in line with the process table.
    ///
    /// Fails only when the table itself cannot be listed; a candidate that
    /// vanishes or cannot be parsed is dropped.
    pub fn scan(&mut self, processes: &dyn ProcessDirectory) -> Result<(), ProcessError> {
        let candidates: Vec<ProcessInfo> = processes
            .processes()?
            .into_iter()
            .filter(|p| is_plotting_cmdline(&p.cmdline, &self.alternate_engine_name))
            .collect();

        // A launcher wrapper and its child share the command line; only the
        // child plots.
        let ppids: BTreeSet<u32> = candidates.iter().map(|p| p.ppid).collect();
        let wanted: Vec<&ProcessInfo> = candidates
            .iter()
            .filter(|p| !ppids.contains(&p.pid))
            .collect();

        let live: BTreeSet<u32> = wanted.iter().map(|p| p.pid).collect();
        self.jobs.retain(|pid, job| {
            let keep = live.contains(pid);
            if !keep {
                info!(pid, plot_id = job.plot_id_prefix(), "plot job ended");
            }
            keep
        });

        for info in wanted {
            if self.jobs.contains_key(&info.pid) {
                continue;
            }
            match self.build_job(processes, info) {
                Ok(job) => {
                    info!(
                        pid = job.pid,
                        plot_id = job.plot_id_prefix(),
                        tmp = %job.tmp_dir.display(),
                        dst = %job.dst_dir.display(),
                        "discovered plot job"
                    );
                    self.jobs.insert(job.pid, job);
                }
                Err(e @ JobError::LogFileConflict { .. }) => {
                    warn!(pid = info.pid, error = %e, "ignoring plot job");
                }
                Err(e) => {
                    debug!(pid = info.pid, error = %e, "ignoring plot candidate");
                }
            }
        }

        Ok(())
    }

    fn build_job(
        &self,
        processes: &dyn ProcessDirectory,
        info: &ProcessInfo,
    ) -> Result<Job, JobError> {
        let command = PlotCommand::parse(&info.cmdline, &self.alternate_engine_name)?;
        let cwd = processes.cwd(info.pid)?;
        let mut job = Job::new(info.pid, command, &cwd);

        job.logfile = self.find_logfile(processes, info.pid)?;
        if let Some(logfile) = &job.logfile {
            let header = self
                .log_policy
                .read_header(job.command.log_dialect(), logfile);
            job.plot_id = header.plot_id;
            if let Some(start) = header.start_time.or_else(|| ctime(logfile)) {
                job.start_time = start;
            }
            if let Err(e) = job.refresh_phase() {
                debug!(pid = info.pid, error = %e, "cannot read log for phase");
            }
        }

        Ok(job)
    }

    fn find_logfile(
        &self,
        processes: &dyn ProcessDirectory,
        pid: u32,
    ) -> Result<Option<PathBuf>, JobError> {
        let mut found: Option<PathBuf> = None;
        for path in processes.open_files(pid)? {
            if !path.starts_with(&self.log_root) {
                continue;
            }
            match &found {
                Some(first) if *first != path => {
                    return Err(JobError::LogFileConflict {
                        pid,
                        first: first.clone(),
                        second: path,
                    });
                }
                Some(_) => {}
                None => found = Some(path),
            }
        }
        Ok(found)
    }

    /// Re-parses every job's log. Called once per tick.
    pub fn refresh_phases(&mut self) {
        for job in self.jobs.values_mut() {
            if let Err(e) = job.refresh_phase() {
                debug!(pid = job.pid, error = %e, "cannot refresh phase");
            }
        }
    }

    /// Snapshot of the current jobs, ordered by pid.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get_mut(&mut self, pid: u32) -> Option<&mut Job> {
        self.jobs.get_mut(&pid)
    }

    /// Pids of jobs whose plot id starts with `prefix`.
    pub fn pids_matching(&self, prefix: &str) -> Vec<u32> {
        self.jobs
            .values()
            .filter(|job| {
                job.plot_id
                    .as_deref()
                    .is_some_and(|id| id.starts_with(prefix))
            })
            .map(|job| job.pid)
            .collect()
    }
}
