//! A single observed plotting process.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::command::{PlotCommand, PlotEngine};
use super::error::JobError;
use crate::phase::{parse_phase, Phase};
use crate::process::{ProcessDirectory, ProcessSignal, RunStatus};

/// Shown in place of a plot id that is not known yet.
pub const UNKNOWN_PLOT_ID: &str = "--------";

// "/tmp/plot-k32-2021-05-01-10-00-<id>.plot.2.tmp"
static TEMP_PLOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*plot-k\d+-.*-([0-9a-f]*)\..*tmp").expect("valid regex"));

/// Lexically resolves `path` against `base`, dropping `.` and trailing
/// separators so paths compare equal to configured directories.
pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    resolved.push(component);
                }
            }
            other => resolved.push(other),
        }
    }
    resolved
}

/// Resource usage of a job's process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub status: RunStatus,
    pub wall_seconds: i64,
    pub user_seconds: f64,
    pub system_seconds: f64,
    pub iowait_seconds: Option<f64>,
    pub memory_bytes: u64,
}

/// Serializable one-line view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub pid: u32,
    pub plot_id: String,
    pub engine: PlotEngine,
    pub k: u8,
    pub tmp_dir: PathBuf,
    pub dst_dir: PathBuf,
    pub phase: String,
    pub started_at: DateTime<Utc>,
    pub status_note: Option<String>,
}

/// One plotting process, identified by pid.
#[derive(Debug, Clone)]
pub struct Job {
    pub pid: u32,
    pub command: PlotCommand,
    /// Staging directory, absolute.
    pub tmp_dir: PathBuf,
    pub tmp2_dir: Option<PathBuf>,
    /// Destination directory, absolute.
    pub dst_dir: PathBuf,
    pub logfile: Option<PathBuf>,
    pub plot_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub phase: Phase,
    /// Why the job was suspended, if it was.
    pub status_note: Option<String>,
}

impl Job {
    /// Creates a job whose directories are resolved against the process
    /// working directory. The log, id and phase are filled in later.
    pub fn new(pid: u32, command: PlotCommand, cwd: &Path) -> Self {
        let tmp_dir = resolve_against(cwd, &command.tmp_dir);
        let tmp2_dir = command
            .tmp2_dir
            .as_deref()
            .map(|dir| resolve_against(cwd, dir));
        let dst_dir = resolve_against(cwd, &command.final_dir);

        Self {
            pid,
            command,
            tmp_dir,
            tmp2_dir,
            dst_dir,
            logfile: None,
            plot_id: None,
            start_time: Utc::now(),
            phase: Phase::unknown(),
            status_note: None,
        }
    }

    /// First eight characters of the plot id, or the placeholder.
    pub fn plot_id_prefix(&self) -> &str {
        match &self.plot_id {
            Some(id) => id.get(..8).unwrap_or(id),
            None => UNKNOWN_PLOT_ID,
        }
    }

    /// Re-reads the whole log and updates the phase.
    ///
    /// A job without a log keeps an unknown phase.
    pub fn refresh_phase(&mut self) -> Result<Phase, JobError> {
        let Some(logfile) = &self.logfile else {
            return Ok(self.phase);
        };
        let bytes = fs::read(logfile)?;
        let text = String::from_utf8_lossy(&bytes);
        self.phase = parse_phase(self.command.log_dialect(), &text);
        Ok(self.phase)
    }

    /// Stops the process and records why.
    pub fn suspend(
        &mut self,
        processes: &dyn ProcessDirectory,
        reason: &str,
    ) -> Result<(), JobError> {
        processes.signal(self.pid, ProcessSignal::Suspend)?;
        self.status_note = Some(reason.to_string());
        Ok(())
    }

    /// Continues a stopped process.
    pub fn resume(&mut self, processes: &dyn ProcessDirectory) -> Result<(), JobError> {
        processes.signal(self.pid, ProcessSignal::Resume)?;
        self.status_note = None;
        Ok(())
    }

    /// Terminates the process. A stopped process cannot act on the
    /// termination request, so it is resumed first.
    pub fn cancel(&mut self, processes: &dyn ProcessDirectory) -> Result<(), JobError> {
        processes.signal(self.pid, ProcessSignal::Resume)?;
        processes.signal(self.pid, ProcessSignal::Terminate)?;
        Ok(())
    }

    /// Bytes used in the staging directory by files carrying this plot id.
    ///
    /// An unreadable directory yields whatever was summed so far.
    pub fn tmp_usage_bytes(&self) -> u64 {
        let Some(plot_id) = &self.plot_id else {
            return 0;
        };
        let entries = match fs::read_dir(&self.tmp_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.tmp_dir.display(), error = %e, "cannot read tmp dir");
                return 0;
            }
        };

        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(plot_id.as_str()))
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    /// Temporary files of this job, found next to one it holds open.
    ///
    /// The process does not keep every intermediate file open, so the
    /// directory of the first open file under one of the job's directories
    /// is scanned for names sharing the full plot id.
    pub fn temp_files(&self, processes: &dyn ProcessDirectory) -> Result<Vec<PathBuf>, JobError> {
        let dirs: Vec<&Path> = [
            Some(self.tmp_dir.as_path()),
            self.tmp2_dir.as_deref(),
            Some(self.dst_dir.as_path()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let open = processes.open_files(self.pid)?;
        let Some(anchor) = open
            .iter()
            .find(|path| dirs.iter().any(|dir| path.starts_with(dir)))
        else {
            warn!(pid = self.pid, "no open file in job directories, the drive may be down");
            return Ok(Vec::new());
        };

        let Some(full_id) = self.full_plot_id(anchor) else {
            debug!(pid = self.pid, file = %anchor.display(), "cannot derive plot id from open file");
            return Ok(Vec::new());
        };
        let Some(parent) = anchor.parent() else {
            return Ok(Vec::new());
        };

        let mut files: Vec<PathBuf> = fs::read_dir(parent)?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(full_id.as_str()))
            .map(|entry| entry.path())
            .collect();
        files.sort();
        Ok(files)
    }

    fn full_plot_id(&self, anchor: &Path) -> Option<String> {
        let anchor = anchor.to_string_lossy();
        if let Some(caps) = TEMP_PLOT_NAME.captures(&anchor) {
            let id = caps.get(1)?.as_str();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }

        let plot_id = self.plot_id.as_deref()?;
        let start = anchor.find(plot_id)?;
        let end = anchor[start..]
            .find(".plot")
            .map(|offset| start + offset)
            .unwrap_or(anchor.len());
        Some(anchor[start..end].to_string())
    }

    /// Snapshot of the process's resource usage.
    pub fn stats(&self, processes: &dyn ProcessDirectory) -> Result<JobStats, JobError> {
        let stats = processes.stats(self.pid)?;
        Ok(JobStats {
            status: stats.status,
            wall_seconds: (Utc::now() - stats.started_at).num_seconds(),
            user_seconds: stats.cpu.user,
            system_seconds: stats.cpu.system,
            iowait_seconds: stats.cpu.iowait,
            memory_bytes: stats.memory_bytes,
        })
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            pid: self.pid,
            plot_id: self.plot_id_prefix().to_string(),
            engine: self.command.engine,
            k: self.command.size,
            tmp_dir: self.tmp_dir.clone(),
            dst_dir: self.dst_dir.clone(),
            phase: self.phase.to_string(),
            started_at: self.start_time,
            status_note: self.status_note.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CpuTimes, ProcessStats};
    use crate::testing::MockProcessDirectory;
    use std::fs::File;
    use tempfile::TempDir;

    fn command(tmp: &str, dst: &str) -> PlotCommand {
        let argv: Vec<String> = ["chia", "plots", "create", "-t", tmp, "-d", dst]
            .iter()
            .map(|s| s.to_string())
            .collect();
        PlotCommand::parse(&argv, "chia_plot").unwrap()
    }

    #[test]
    fn test_resolve_against() {
        let cwd = Path::new("/home/farmer");
        assert_eq!(resolve_against(cwd, Path::new("tmp")), PathBuf::from("/home/farmer/tmp"));
        assert_eq!(resolve_against(cwd, Path::new("/mnt/dst/")), PathBuf::from("/mnt/dst"));
        assert_eq!(resolve_against(cwd, Path::new(".")), PathBuf::from("/home/farmer"));
        assert_eq!(resolve_against(cwd, Path::new("../x")), PathBuf::from("/home/x"));
    }

    #[test]
    fn test_new_resolves_dirs() {
        let job = Job::new(10, command("t", "/farm/dst"), Path::new("/work"));
        assert_eq!(job.tmp_dir, PathBuf::from("/work/t"));
        assert_eq!(job.dst_dir, PathBuf::from("/farm/dst"));
        assert!(job.tmp2_dir.is_none());
        assert!(!job.phase.is_known());
        assert_eq!(job.plot_id_prefix(), UNKNOWN_PLOT_ID);
    }

    #[test]
    fn test_plot_id_prefix() {
        let mut job = Job::new(10, command("/t", "/d"), Path::new("/"));
        job.plot_id = Some("3eb8a37981de1cc76187a36ed947ab4307943cf92967a7e166841186c7899e24".into());
        assert_eq!(job.plot_id_prefix(), "3eb8a379");
        job.plot_id = Some("abc".into());
        assert_eq!(job.plot_id_prefix(), "abc");
    }

    #[test]
    fn test_refresh_phase_reads_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("job.log");
        fs::write(&log, "Starting phase 1/4: Forward Propagation\nComputing table 3\n").unwrap();

        let mut job = Job::new(10, command("/t", "/d"), Path::new("/"));
        assert_eq!(job.refresh_phase().unwrap(), Phase::unknown());

        job.logfile = Some(log);
        assert_eq!(job.refresh_phase().unwrap(), Phase::new(1, 3));
        assert_eq!(job.phase, Phase::new(1, 3));
    }

    #[test]
    fn test_suspend_resume_cancel_signal_process() {
        let processes = MockProcessDirectory::new();
        let mut job = Job::new(10, command("/t", "/d"), Path::new("/"));

        job.suspend(&processes, "disk full").unwrap();
        assert_eq!(job.status_note.as_deref(), Some("disk full"));
        job.resume(&processes).unwrap();
        assert!(job.status_note.is_none());
        job.cancel(&processes).unwrap();

        assert_eq!(
            processes.signals(),
            vec![
                (10, ProcessSignal::Suspend),
                (10, ProcessSignal::Resume),
                (10, ProcessSignal::Resume),
                (10, ProcessSignal::Terminate),
            ]
        );
    }

    #[test]
    fn test_tmp_usage_counts_only_this_plot() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("plot-k32-aaaa1111.plot.2.tmp"))
            .unwrap()
            .set_len(300)
            .unwrap();
        File::create(dir.path().join("plot-k32-aaaa1111.plot.table1.tmp"))
            .unwrap()
            .set_len(200)
            .unwrap();
        File::create(dir.path().join("plot-k32-bbbb2222.plot.2.tmp"))
            .unwrap()
            .set_len(1000)
            .unwrap();

        let tmp = dir.path().to_string_lossy().to_string();
        let mut job = Job::new(10, command(&tmp, "/d"), Path::new("/"));
        assert_eq!(job.tmp_usage_bytes(), 0);
        job.plot_id = Some("aaaa1111".into());
        assert_eq!(job.tmp_usage_bytes(), 500);
    }

    #[test]
    fn test_tmp_usage_of_missing_dir_is_zero() {
        let mut job = Job::new(10, command("/nonexistent/plotherd/tmp", "/d"), Path::new("/"));
        job.plot_id = Some("aaaa1111".into());
        assert_eq!(job.tmp_usage_bytes(), 0);
    }

    #[test]
    fn test_temp_files_globs_siblings() {
        let dir = TempDir::new().unwrap();
        let id = "0a1b2c3d4e5f";
        let open = dir.path().join(format!("plot-k32-2021-05-01-10-00-{id}.plot.2.tmp"));
        let sibling = dir.path().join(format!("plot-k32-2021-05-01-10-00-{id}.plot.p1.t3.sort.tmp"));
        File::create(&open).unwrap();
        File::create(&sibling).unwrap();
        File::create(dir.path().join("plot-k32-2021-05-01-10-00-ffff.plot.2.tmp")).unwrap();

        let tmp = dir.path().to_string_lossy().to_string();
        let mut job = Job::new(10, command(&tmp, "/d"), Path::new("/"));
        job.plot_id = Some(id.to_string());

        let processes = MockProcessDirectory::new();
        processes.set_open_files(10, vec![PathBuf::from("/logs/job.log"), open.clone()]);

        let mut expected = vec![open, sibling];
        expected.sort();
        assert_eq!(job.temp_files(&processes).unwrap(), expected);
    }

    #[test]
    fn test_temp_files_without_anchor_is_empty() {
        let job = Job::new(10, command("/t", "/d"), Path::new("/"));
        let processes = MockProcessDirectory::new();
        processes.set_open_files(10, vec![PathBuf::from("/elsewhere/file")]);
        assert!(job.temp_files(&processes).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let processes = MockProcessDirectory::new();
        processes.set_stats(
            10,
            ProcessStats {
                status: RunStatus::Stopped,
                started_at: Utc::now() - chrono::Duration::seconds(120),
                cpu: CpuTimes {
                    user: 50.0,
                    system: 5.0,
                    iowait: None,
                },
                memory_bytes: 4096,
            },
        );

        let job = Job::new(10, command("/t", "/d"), Path::new("/"));
        let stats = job.stats(&processes).unwrap();
        assert_eq!(stats.status, RunStatus::Stopped);
        assert!(stats.wall_seconds >= 120);
        assert_eq!(stats.user_seconds, 50.0);
        assert_eq!(stats.memory_bytes, 4096);
    }

    #[test]
    fn test_stats_of_vanished_process() {
        let processes = MockProcessDirectory::new();
        let job = Job::new(10, command("/t", "/d"), Path::new("/"));
        let err = job.stats(&processes).unwrap_err();
        assert!(err.is_skippable());
    }
}
