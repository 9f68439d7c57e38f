//! Mock process directory for testing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::process::{ProcessDirectory, ProcessError, ProcessInfo, ProcessSignal, ProcessStats};

/// Mock implementation of the ProcessDirectory trait.
///
/// Provides controllable behavior for testing:
/// - Script the process table, working directories and open files
/// - Simulate processes vanishing between listing and inspection
/// - Record signals for assertions
///
/// # Example
///
/// ```rust,ignore
/// use plotherd_core::testing::{fixtures, MockProcessDirectory};
///
/// let processes = MockProcessDirectory::new();
/// processes.add_process(fixtures::process(100, 1, "chia plots create -t /t -d /d"));
/// processes.set_cwd(100, "/home/farmer");
///
/// registry.scan(&processes)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockProcessDirectory {
    processes: Arc<RwLock<Vec<ProcessInfo>>>,
    cwds: Arc<RwLock<HashMap<u32, PathBuf>>>,
    open_files: Arc<RwLock<HashMap<u32, Vec<PathBuf>>>>,
    stats: Arc<RwLock<HashMap<u32, ProcessStats>>>,
    vanished: Arc<RwLock<HashSet<u32>>>,
    signals: Arc<RwLock<Vec<(u32, ProcessSignal)>>>,
}

impl MockProcessDirectory {
    /// Create an empty process table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to the process table.
    pub fn add_process(&self, info: ProcessInfo) {
        self.processes.write().unwrap().push(info);
    }

    /// Remove a process, as if it exited.
    pub fn remove_process(&self, pid: u32) {
        self.processes.write().unwrap().retain(|p| p.pid != pid);
    }

    /// Set the working directory reported for `pid` (default `/`).
    pub fn set_cwd(&self, pid: u32, cwd: impl Into<PathBuf>) {
        self.cwds.write().unwrap().insert(pid, cwd.into());
    }

    /// Set the open files reported for `pid` (default none).
    pub fn set_open_files(&self, pid: u32, files: Vec<PathBuf>) {
        self.open_files.write().unwrap().insert(pid, files);
    }

    /// Set the resource snapshot reported for `pid`.
    pub fn set_stats(&self, pid: u32, stats: ProcessStats) {
        self.stats.write().unwrap().insert(pid, stats);
    }

    /// Keep `pid` listed but fail every inspection of it.
    pub fn mark_vanished(&self, pid: u32) {
        self.vanished.write().unwrap().insert(pid);
    }

    /// Get all recorded signals, in order.
    pub fn signals(&self) -> Vec<(u32, ProcessSignal)> {
        self.signals.read().unwrap().clone()
    }

    fn check(&self, pid: u32) -> Result<(), ProcessError> {
        if self.vanished.read().unwrap().contains(&pid) {
            return Err(ProcessError::Vanished { pid });
        }
        Ok(())
    }
}

impl ProcessDirectory for MockProcessDirectory {
    fn name(&self) -> &str {
        "mock"
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>, ProcessError> {
        Ok(self.processes.read().unwrap().clone())
    }

    fn cwd(&self, pid: u32) -> Result<PathBuf, ProcessError> {
        self.check(pid)?;
        Ok(self
            .cwds
            .read()
            .unwrap()
            .get(&pid)
            .cloned()
            .unwrap_or_else(|| PathBuf::from("/")))
    }

    fn open_files(&self, pid: u32) -> Result<Vec<PathBuf>, ProcessError> {
        self.check(pid)?;
        Ok(self
            .open_files
            .read()
            .unwrap()
            .get(&pid)
            .cloned()
            .unwrap_or_default())
    }

    fn stats(&self, pid: u32) -> Result<ProcessStats, ProcessError> {
        self.check(pid)?;
        self.stats
            .read()
            .unwrap()
            .get(&pid)
            .cloned()
            .ok_or(ProcessError::Vanished { pid })
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> Result<(), ProcessError> {
        self.check(pid)?;
        self.signals.write().unwrap().push((pid, signal));
        Ok(())
    }
}
