//! Free space on the archive host.

use std::collections::BTreeMap;
use std::io;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

use crate::config::ArchiveConfig;

/// Errors raised while probing archive space.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe command could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The probe command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Reports free bytes per archive mount point.
pub trait ArchiveSpaceProbe: Send + Sync {
    fn free_space(&self, config: &ArchiveConfig) -> Result<BTreeMap<String, u64>, ProbeError>;
}

/// Runs `df -aBK` on the archive host (over ssh unless it is local).
#[derive(Debug, Default, Clone)]
pub struct DfSpaceProbe;

impl DfSpaceProbe {
    fn command(config: &ArchiveConfig) -> Command {
        if config.is_local() {
            let mut cmd = Command::new("df");
            cmd.arg("-aBK");
            cmd
        } else {
            let mut cmd = Command::new("ssh");
            cmd.arg(format!("{}@{}", config.rsyncd_user, config.rsyncd_host))
                .arg("df")
                .arg("-aBK");
            cmd
        }
    }
}

impl ArchiveSpaceProbe for DfSpaceProbe {
    fn free_space(&self, config: &ArchiveConfig) -> Result<BTreeMap<String, u64>, ProbeError> {
        let mut cmd = Self::command(config);
        let program = cmd.get_program().to_string_lossy().to_string();
        debug!(%program, host = %config.rsyncd_host, "probing archive space");

        let output = cmd.output().map_err(|source| ProbeError::Spawn {
            program: program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(ProbeError::Failed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_df_output(
            &String::from_utf8_lossy(&output.stdout),
            &config.rsyncd_path,
        ))
    }
}

/// Free bytes per mount point below `archive_root`, from `df -aBK` output.
///
/// Pseudo filesystems report `-` as available space and are skipped.
pub fn parse_df_output(output: &str, archive_root: &str) -> BTreeMap<String, u64> {
    let root = archive_root.trim_end_matches('/');
    let needle = format!(" {root}/");

    output
        .lines()
        .filter(|line| line.contains(&needle))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 || fields[3] == "-" {
                return None;
            }
            let kib: u64 = fields[3].trim_end_matches('K').parse().ok()?;
            Some((fields[5].to_string(), kib * 1024))
        })
        .collect()
}
