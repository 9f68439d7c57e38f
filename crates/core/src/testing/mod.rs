//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the capability traits the
//! scheduler depends on (process table, disk space, archive probe, transfer
//! spawner), so discovery and archive scheduling can be exercised without
//! real plotting processes or remote hosts.
//!
//! # Example
//!
//! ```rust,ignore
//! use plotherd_core::testing::{fixtures, MockProcessDirectory, MockSpawner};
//!
//! let processes = MockProcessDirectory::new();
//! processes.add_process(fixtures::process(100, 1, "chia plots create -t /t -d /d"));
//!
//! let spawner = MockSpawner::visible_in(processes.clone());
//! // Build an ArchiveLauncher or Scheduler with them...
//! ```

mod mock_archive;
mod mock_processes;

pub use mock_archive::{FixedDiskSpace, MockSpaceProbe, MockSpawner};
pub use mock_processes::MockProcessDirectory;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fs::File;
    use std::path::{Path, PathBuf};

    use crate::config::{load_config_from_str, ArchiveConfig, Config};
    use crate::process::ProcessInfo;

    /// A process table row for a whitespace separated command line. The
    /// name is the basename of the first token.
    pub fn process(pid: u32, ppid: u32, cmdline: &str) -> ProcessInfo {
        let cmdline: Vec<String> = cmdline.split_whitespace().map(String::from).collect();
        let name = cmdline
            .first()
            .and_then(|exe| Path::new(exe).file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        ProcessInfo {
            pid,
            ppid,
            name,
            cmdline,
        }
    }

    /// Archive settings for `host` with the archive rooted at `path`.
    pub fn archive_config(host: &str, path: &str) -> ArchiveConfig {
        ArchiveConfig {
            rsyncd_host: host.to_string(),
            rsyncd_user: "farmer".to_string(),
            rsyncd_path: path.to_string(),
            rsyncd_module: "plots".to_string(),
            rsyncd_port: 12000,
            rsyncd_bwlimit: None,
            max_concurrent_transfer: None,
            index: 0,
        }
    }

    /// A configuration with the given log dir and destination dirs, and no
    /// archive section.
    pub fn config(log: &Path, dst: &[PathBuf]) -> Config {
        let dirs: Vec<String> = dst
            .iter()
            .map(|d| format!("{:?}", d.to_string_lossy()))
            .collect();
        let toml = format!(
            "[directories]\nlog = {:?}\ntmp = [{}]\n\n[scheduling]\nlog_read_attempts = 1\nlog_read_delay_ms = 0\n",
            log.to_string_lossy(),
            dirs.join(", ")
        );
        load_config_from_str(&toml).expect("fixture config parses")
    }

    /// Creates a sparse file of `len` bytes.
    pub fn sparse_file(dir: &Path, name: &str, len: u64) -> PathBuf {
        let path = dir.join(name);
        File::create(&path)
            .and_then(|f| f.set_len(len))
            .expect("create sparse file");
        path
    }
}
