//! Choosing the next plot to archive.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{trace, warn};

use super::plots::list_completed_plots;
use super::priority::compute_priority;
use super::transfers::ArchiveTransfer;
use crate::disk::{DiskSpace, GB};
use crate::job::{furthest_phase, Job};

/// The plot picked for the next transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotCandidate {
    pub plot: PathBuf,
    pub dst_dir: PathBuf,
    pub priority: i64,
}

/// Picks the first idle plot of the highest priority destination directory.
///
/// Directories are visited in order and a directory with plots replaces the
/// current best on equal priority, so the last of several tied directories
/// wins. When every plot of the winning directory is already being moved, the
/// earlier choice stands. A directory whose free space cannot be read is
/// skipped.
pub fn select_plot(
    dst_dirs: &[PathBuf],
    jobs: &[Job],
    transfers: &[ArchiveTransfer],
    disk: &dyn DiskSpace,
    plot_size_class: u8,
) -> Option<PlotCandidate> {
    let in_flight: Vec<&str> = transfers
        .iter()
        .filter_map(|t| t.plot.as_deref())
        .collect();

    let mut best = i64::MIN;
    let mut chosen = None;

    for dir in dst_dirs {
        let free = match disk.free_bytes(dir) {
            Ok(free) => free,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read free space");
                continue;
            }
        };
        let phase = furthest_phase(dir, jobs);
        let plots = list_completed_plots(dir, plot_size_class);
        let priority = compute_priority(phase, free as f64 / GB as f64, plots.len());
        trace!(dir = %dir.display(), %phase, free, plots = plots.len(), priority, "scored destination");

        if priority >= best && !plots.is_empty() {
            best = priority;
            if let Some(plot) = plots.into_iter().find(|plot| {
                let name = plot.to_string_lossy();
                !in_flight.iter().any(|moving| *moving == name)
            }) {
                chosen = Some(PlotCandidate {
                    plot,
                    dst_dir: dir.clone(),
                    priority,
                });
            }
        }
    }

    chosen
}
