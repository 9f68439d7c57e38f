use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
    #[serde(default)]
    pub plotting: PlottingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Staging, destination and log directories
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoriesConfig {
    /// Directory the plotting jobs write their logs into. Also used for
    /// the per-plot archive transfer logs.
    pub log: PathBuf,
    /// Staging directories, in placement order.
    pub tmp: Vec<PathBuf>,
    /// Destination directories. When absent, plots are finished in place
    /// and the staging directories double as destinations.
    #[serde(default)]
    pub dst: Option<Vec<PathBuf>>,
}

impl DirectoriesConfig {
    /// Directories scanned for completed plots.
    pub fn dst_directories(&self) -> &[PathBuf] {
        match &self.dst {
            Some(dst) if !dst.is_empty() => dst,
            _ => &self.tmp,
        }
    }
}

/// Archive (rsync) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    /// Host running the rsync daemon. `localhost` means local copies.
    pub rsyncd_host: String,
    /// User used for ssh and rsync daemon logins.
    pub rsyncd_user: String,
    /// Filesystem root on the archive host holding the archive mounts.
    pub rsyncd_path: String,
    /// rsync daemon module exporting `rsyncd_path`.
    pub rsyncd_module: String,
    #[serde(default = "default_rsyncd_port")]
    pub rsyncd_port: u16,
    /// Bandwidth cap in KiB/s passed to rsync.
    #[serde(default)]
    pub rsyncd_bwlimit: Option<u32>,
    /// Concurrent transfers allowed (0 or absent means 1).
    #[serde(default)]
    pub max_concurrent_transfer: Option<usize>,
    /// Rotation index into the sorted list of archive dirs with room.
    #[serde(default)]
    pub index: usize,
}

fn default_rsyncd_port() -> u16 {
    12000
}

impl ArchiveConfig {
    /// Whether transfers stay on this machine.
    pub fn is_local(&self) -> bool {
        matches!(
            self.rsyncd_host.trim().to_lowercase().as_str(),
            "localhost" | "127.0.0.1" | "::1"
        )
    }
}

/// Plotting engine recognition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlottingConfig {
    /// Executable name of the alternate (fast) plotting engine.
    #[serde(default = "default_alternate_engine_name")]
    pub alternate_engine_name: String,
    /// Plot size class (`k`) of archived plots.
    #[serde(default = "default_plot_size_class")]
    pub plot_size_class: u8,
}

impl Default for PlottingConfig {
    fn default() -> Self {
        Self {
            alternate_engine_name: default_alternate_engine_name(),
            plot_size_class: default_plot_size_class(),
        }
    }
}

fn default_alternate_engine_name() -> String {
    "chia_plot".to_string()
}

fn default_plot_size_class() -> u8 {
    32
}

/// Tick loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
    /// Attempts at reading a new job's log header.
    #[serde(default = "default_log_read_attempts")]
    pub log_read_attempts: u32,
    /// Delay between header read attempts.
    #[serde(default = "default_log_read_delay")]
    pub log_read_delay_ms: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: default_polling_interval(),
            log_read_attempts: default_log_read_attempts(),
            log_read_delay_ms: default_log_read_delay(),
        }
    }
}

fn default_polling_interval() -> u64 {
    20
}

fn default_log_read_attempts() -> u32 {
    3
}

fn default_log_read_delay() -> u64 {
    1000
}

/// Metrics export
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// node_exporter textfile collector target, rewritten after every tick.
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}
