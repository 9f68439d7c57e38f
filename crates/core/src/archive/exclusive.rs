//! Exclusive creation of per-plot transfer logs.
//!
//! The log file doubles as the lock that keeps two schedulers from moving the
//! same plot: whoever creates it owns the transfer.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Log file of the transfer of `plot`: `archive_out_<stem>.log`.
pub fn archive_log_path(log_dir: &Path, plot: &Path) -> PathBuf {
    let stem = plot
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stem = stem.strip_suffix(".plot").unwrap_or(&stem);
    log_dir.join(format!("archive_out_{stem}.log"))
}

/// Creates `path`, failing with `ErrorKind::AlreadyExists` if it is there.
pub fn create_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
