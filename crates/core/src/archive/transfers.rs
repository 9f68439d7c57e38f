//! Running archive transfers, read from the process table.

use serde::Serialize;

use crate::config::ArchiveConfig;
use crate::process::{ProcessDirectory, ProcessError};

/// Executable name of the transfer tool.
pub const TRANSFER_PROCESS_NAME: &str = "rsync";

/// One in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveTransfer {
    /// `None` for a launch not visible in the process table yet.
    pub pid: Option<u32>,
    /// Plot file being moved, as given on the command line.
    pub plot: Option<String>,
    /// Local address the transfer is bound to (`--address=`).
    pub tunnel_ip: Option<String>,
}

impl ArchiveTransfer {
    /// Stand-in for a transfer launched this tick.
    pub fn pending(plot: impl Into<String>) -> Self {
        Self {
            pid: None,
            plot: Some(plot.into()),
            tunnel_ip: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pid.is_none()
    }
}

/// Transfer destination for an archive directory.
///
/// Remote hosts are addressed through the rsync daemon, with the configured
/// path replaced by the module name. A local host gets the plain directory.
pub fn rsync_dest(config: &ArchiveConfig, archive_dir: &str) -> String {
    if config.is_local() {
        return archive_dir.to_string();
    }
    let module_path = archive_dir.replace(&config.rsyncd_path, &config.rsyncd_module);
    format!(
        "rsync://{}@{}:{}/{}",
        config.rsyncd_user,
        config.rsyncd_host,
        config.rsyncd_port,
        module_path.trim_start_matches('/')
    )
}

/// Transfer processes whose arguments target the archive.
pub fn detect_transfers(
    processes: &dyn ProcessDirectory,
    config: &ArchiveConfig,
) -> Result<Vec<ArchiveTransfer>, ProcessError> {
    let dest = rsync_dest(config, "/");

    let transfers = processes
        .processes()?
        .into_iter()
        .filter(|p| p.name == TRANSFER_PROCESS_NAME)
        .filter_map(|p| {
            let mut matched = false;
            let mut plot = None;
            let mut tunnel_ip = None;
            for arg in &p.cmdline {
                if arg.starts_with(&dest) {
                    matched = true;
                }
                if arg.ends_with(".plot") {
                    plot = Some(arg.clone());
                }
                if let Some(ip) = arg.strip_prefix("--address=") {
                    tunnel_ip = Some(ip.to_string());
                }
            }
            matched.then_some(ArchiveTransfer {
                pid: Some(p.pid),
                plot,
                tunnel_ip,
            })
        })
        .collect();

    Ok(transfers)
}
