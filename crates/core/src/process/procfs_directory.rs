//! `/proc` backed process directory.

use chrono::{DateTime, TimeZone, Utc};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use procfs::process::{FDTarget, Process};
use procfs::ProcError;
use std::path::PathBuf;
use tracing::trace;

use super::error::ProcessError;
use super::traits::ProcessDirectory;
use super::types::{CpuTimes, ProcessInfo, ProcessSignal, ProcessStats, RunStatus};

/// Process directory reading the Linux procfs.
#[derive(Debug, Default, Clone)]
pub struct ProcfsDirectory;

impl ProcfsDirectory {
    pub fn new() -> Self {
        Self
    }

    fn open(pid: u32) -> Result<Process, ProcessError> {
        Process::new(pid as i32).map_err(|e| map_proc_error(pid, e))
    }
}

fn map_proc_error(pid: u32, error: ProcError) -> ProcessError {
    match error {
        ProcError::NotFound(_) => ProcessError::Vanished { pid },
        ProcError::PermissionDenied(_) => ProcessError::AccessDenied { pid },
        ProcError::Io(e, _) => ProcessError::Io(e),
        other => ProcessError::other(other.to_string()),
    }
}

fn map_errno(pid: u32, errno: Errno) -> ProcessError {
    match errno {
        Errno::ESRCH => ProcessError::Vanished { pid },
        Errno::EPERM => ProcessError::AccessDenied { pid },
        other => ProcessError::Io(std::io::Error::from(other)),
    }
}

impl ProcessDirectory for ProcfsDirectory {
    fn name(&self) -> &str {
        "procfs"
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>, ProcessError> {
        let all = procfs::process::all_processes()
            .map_err(|e| ProcessError::other(e.to_string()))?;

        let mut processes = Vec::new();
        for process in all {
            let Ok(process) = process else {
                continue;
            };
            let pid = process.pid as u32;
            // Exited or foreign processes are expected here; skip them.
            let (stat, cmdline) = match (process.stat(), process.cmdline()) {
                (Ok(stat), Ok(cmdline)) => (stat, cmdline),
                (Err(e), _) | (_, Err(e)) => {
                    trace!(pid, error = %e, "skipping process");
                    continue;
                }
            };
            processes.push(ProcessInfo {
                pid,
                ppid: stat.ppid.max(0) as u32,
                name: stat.comm,
                cmdline,
            });
        }

        Ok(processes)
    }

    fn cwd(&self, pid: u32) -> Result<PathBuf, ProcessError> {
        Self::open(pid)?.cwd().map_err(|e| map_proc_error(pid, e))
    }

    fn open_files(&self, pid: u32) -> Result<Vec<PathBuf>, ProcessError> {
        let fds = Self::open(pid)?.fd().map_err(|e| map_proc_error(pid, e))?;

        Ok(fds
            .filter_map(Result::ok)
            .filter_map(|fd| match fd.target {
                FDTarget::Path(path) => Some(path),
                _ => None,
            })
            .collect())
    }

    fn stats(&self, pid: u32) -> Result<ProcessStats, ProcessError> {
        let stat = Self::open(pid)?.stat().map_err(|e| map_proc_error(pid, e))?;
        let ticks = procfs::ticks_per_second() as f64;
        let boot_secs = procfs::boot_time_secs().map_err(|e| map_proc_error(pid, e))?;

        let start_secs = boot_secs as f64 + stat.starttime as f64 / ticks;
        let started_at: DateTime<Utc> = Utc
            .timestamp_opt(start_secs as i64, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(ProcessStats {
            status: RunStatus::from_state_char(stat.state),
            started_at,
            cpu: CpuTimes {
                user: stat.utime as f64 / ticks,
                system: stat.stime as f64 / ticks,
                iowait: stat.delayacct_blkio_ticks.map(|t| t as f64 / ticks),
            },
            memory_bytes: stat.vsize,
        })
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> Result<(), ProcessError> {
        let signal = match signal {
            ProcessSignal::Suspend => Signal::SIGSTOP,
            ProcessSignal::Resume => Signal::SIGCONT,
            ProcessSignal::Terminate => Signal::SIGTERM,
        };
        kill(Pid::from_raw(pid as i32), signal).map_err(|e| map_errno(pid, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_own_process() {
        let directory = ProcfsDirectory::new();
        let own = std::process::id();
        let processes = directory.processes().unwrap();
        assert!(processes.iter().any(|p| p.pid == own));
    }

    #[test]
    fn test_own_cwd_and_stats() {
        let directory = ProcfsDirectory::new();
        let own = std::process::id();
        assert_eq!(
            directory.cwd(own).unwrap(),
            std::env::current_dir().unwrap()
        );
        let stats = directory.stats(own).unwrap();
        assert!(stats.memory_bytes > 0);
        assert!(stats.started_at <= Utc::now());
    }

    #[test]
    fn test_missing_process_is_vanished() {
        let directory = ProcfsDirectory::new();
        // Above the default pid_max of 4194304.
        let err = directory.cwd(4_194_305).unwrap_err();
        assert!(err.is_skippable());
    }
}
