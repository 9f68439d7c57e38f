//! Mock archive capabilities for testing.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use super::mock_processes::MockProcessDirectory;
use crate::archive::{ArchiveSpaceProbe, ProbeError, TransferCommand, TransferSpawner};
use crate::config::ArchiveConfig;
use crate::disk::DiskSpace;
use crate::process::ProcessInfo;

/// Mock implementation of the TransferSpawner trait.
///
/// Records every spawned command and hands out increasing pids. When attached
/// to a `MockProcessDirectory`, each spawn also adds an `rsync` row so the
/// next tick sees the transfer.
#[derive(Debug, Clone)]
pub struct MockSpawner {
    spawned: Arc<RwLock<Vec<TransferCommand>>>,
    next_pid: Arc<AtomicU32>,
    next_error: Arc<RwLock<Option<io::ErrorKind>>>,
    processes: Option<MockProcessDirectory>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Create a spawner whose children never show up in a process table.
    pub fn new() -> Self {
        Self {
            spawned: Arc::new(RwLock::new(Vec::new())),
            next_pid: Arc::new(AtomicU32::new(50_000)),
            next_error: Arc::new(RwLock::new(None)),
            processes: None,
        }
    }

    /// Create a spawner whose children appear in `processes`.
    pub fn visible_in(processes: MockProcessDirectory) -> Self {
        Self {
            processes: Some(processes),
            ..Self::new()
        }
    }

    /// Get all spawned commands.
    pub fn spawned(&self) -> Vec<TransferCommand> {
        self.spawned.read().unwrap().clone()
    }

    /// Get the number of spawns performed.
    pub fn spawn_count(&self) -> usize {
        self.spawned.read().unwrap().len()
    }

    /// Configure the next spawn to fail.
    pub fn set_next_error(&self, kind: io::ErrorKind) {
        *self.next_error.write().unwrap() = Some(kind);
    }
}

impl TransferSpawner for MockSpawner {
    fn spawn(&self, command: &TransferCommand, _log: File) -> io::Result<u32> {
        if let Some(kind) = self.next_error.write().unwrap().take() {
            return Err(io::Error::from(kind));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawned.write().unwrap().push(command.clone());

        if let Some(processes) = &self.processes {
            let mut cmdline = vec![command.program.clone()];
            cmdline.extend(command.args.iter().cloned());
            processes.add_process(ProcessInfo {
                pid,
                ppid: 1,
                name: command.program.clone(),
                cmdline,
            });
        }

        Ok(pid)
    }
}

/// Mock implementation of the ArchiveSpaceProbe trait.
#[derive(Debug, Clone, Default)]
pub struct MockSpaceProbe {
    free: Arc<RwLock<BTreeMap<String, u64>>>,
    fail: Arc<RwLock<bool>>,
    calls: Arc<AtomicU32>,
}

impl MockSpaceProbe {
    /// Create a probe that reports no archive directories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the free bytes reported for an archive directory.
    pub fn set_free(&self, dir: impl Into<String>, bytes: u64) {
        self.free.write().unwrap().insert(dir.into(), bytes);
    }

    /// Make every probe fail.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.write().unwrap() = fail;
    }

    /// Get the number of probes performed.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchiveSpaceProbe for MockSpaceProbe {
    fn free_space(&self, _config: &ArchiveConfig) -> Result<BTreeMap<String, u64>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.read().unwrap() {
            return Err(ProbeError::Failed {
                program: "ssh".to_string(),
                status: "exit status: 255".to_string(),
                stderr: "connection refused".to_string(),
            });
        }
        Ok(self.free.read().unwrap().clone())
    }
}

/// Disk space with fixed answers per directory.
#[derive(Debug, Clone)]
pub struct FixedDiskSpace {
    free: Arc<RwLock<HashMap<PathBuf, u64>>>,
    default: u64,
}

impl FixedDiskSpace {
    /// Every directory reports `default` free bytes unless overridden.
    pub fn new(default: u64) -> Self {
        Self {
            free: Arc::new(RwLock::new(HashMap::new())),
            default,
        }
    }

    /// Set the free bytes reported for `dir`.
    pub fn set_free(&self, dir: impl Into<PathBuf>, bytes: u64) {
        self.free.write().unwrap().insert(dir.into(), bytes);
    }
}

impl DiskSpace for FixedDiskSpace {
    fn free_bytes(&self, path: &Path) -> io::Result<u64> {
        Ok(self
            .free
            .read()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(self.default))
    }
}
