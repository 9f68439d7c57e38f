//! Completed plot files in a destination directory.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::disk::GB;

/// Expected size of a finished plot of size class `k`.
///
/// A k32 plot is about 108 GB; other classes scale with the table entry
/// count, `(2k + 1) * 2^(k - 1)`.
pub fn expected_plot_size(k: u8) -> u64 {
    let k32 = 108 * GB;
    if k == 32 {
        return k32;
    }
    let scale = |k: f64| (2.0 * k + 1.0) * (k - 1.0).exp2();
    (k32 as f64 * scale(k as f64) / scale(32.0)) as u64
}

/// Plots of size class `k` in `dir` that are fully written, sorted by path.
///
/// A file counts only once it exceeds 95% of the expected size, so an
/// in-progress copy is never offered for archiving. An unreadable directory
/// yields no plots.
pub fn list_completed_plots(dir: &Path, k: u8) -> Vec<PathBuf> {
    let prefix = format!("plot-k{k}-");
    let min_size = expected_plot_size(k) as f64 * 0.95;

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list destination dir");
            return Vec::new();
        }
    };

    let mut plots: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".plot")
        })
        .filter(|entry| {
            entry
                .metadata()
                .map(|meta| meta.is_file() && meta.len() as f64 > min_size)
                .unwrap_or(false)
        })
        .map(|entry| entry.path())
        .collect();
    plots.sort();
    plots
}
