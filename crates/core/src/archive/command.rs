//! The transfer command line.

use std::fmt;
use std::path::{Path, PathBuf};

use super::transfers::{rsync_dest, TRANSFER_PROCESS_NAME};
use crate::config::ArchiveConfig;

/// A fully built transfer of one plot to one archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub program: String,
    pub args: Vec<String>,
    pub plot: PathBuf,
    pub destination: String,
}

impl TransferCommand {
    /// Moves `plot` into `archive_dir`, removing the source once copied.
    pub fn new(config: &ArchiveConfig, plot: &Path, archive_dir: &str) -> Self {
        let destination = rsync_dest(config, archive_dir);

        let mut args = Vec::new();
        if let Some(limit) = config.rsyncd_bwlimit.filter(|limit| *limit > 0) {
            args.push(format!("--bwlimit={limit}"));
        }
        args.extend(
            ["-v", "-h", "--compress-level=0", "--remove-source-files", "-P"]
                .into_iter()
                .map(String::from),
        );
        args.push(plot.to_string_lossy().to_string());
        args.push(destination.clone());

        Self {
            program: TRANSFER_PROCESS_NAME.to_string(),
            args,
            plot: plot.to_path_buf(),
            destination,
        }
    }
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, bwlimit: Option<u32>) -> ArchiveConfig {
        ArchiveConfig {
            rsyncd_host: host.to_string(),
            rsyncd_user: "farmer".to_string(),
            rsyncd_path: "/mnt/archive".to_string(),
            rsyncd_module: "plots".to_string(),
            rsyncd_port: 12000,
            rsyncd_bwlimit: bwlimit,
            max_concurrent_transfer: None,
            index: 0,
        }
    }

    #[test]
    fn test_remote_command() {
        let cmd = TransferCommand::new(
            &config("nas", Some(80000)),
            Path::new("/dst/plot-k32-a.plot"),
            "/mnt/archive/disk01",
        );
        assert_eq!(
            cmd.to_string(),
            "rsync --bwlimit=80000 -v -h --compress-level=0 --remove-source-files -P \
             /dst/plot-k32-a.plot rsync://farmer@nas:12000/plots/disk01"
        );
    }

    #[test]
    fn test_local_command_without_limit() {
        let cmd = TransferCommand::new(
            &config("localhost", None),
            Path::new("/dst/plot-k32-a.plot"),
            "/mnt/archive/disk01",
        );
        assert_eq!(cmd.program, "rsync");
        assert_eq!(cmd.destination, "/mnt/archive/disk01");
        assert_eq!(cmd.args.first().map(String::as_str), Some("-v"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("/mnt/archive/disk01"));
    }
}
