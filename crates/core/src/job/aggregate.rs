//! Phase views over directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::plot_job::Job;
use crate::phase::Phase;

/// Phases of the jobs staging in `dir`, sorted.
pub fn phases_for_tmp_dir(dir: &Path, jobs: &[Job]) -> Vec<Phase> {
    let mut phases: Vec<Phase> = jobs
        .iter()
        .filter(|job| job.tmp_dir == dir)
        .map(|job| job.phase)
        .collect();
    phases.sort();
    phases
}

/// Phases of the jobs writing their plot to `dir`, sorted.
pub fn phases_for_dst_dir(dir: &Path, jobs: &[Job]) -> Vec<Phase> {
    let mut phases: Vec<Phase> = jobs
        .iter()
        .filter(|job| job.dst_dir == dir)
        .map(|job| job.phase)
        .collect();
    phases.sort();
    phases
}

/// Furthest phase among jobs writing to `dir`; `0:0` when none do.
pub fn furthest_phase(dir: &Path, jobs: &[Job]) -> Phase {
    phases_for_dst_dir(dir, jobs)
        .into_iter()
        .max()
        .unwrap_or(Phase::new(0, 0))
}

/// Furthest phase per destination directory.
pub fn dst_dirs_to_furthest_phase(dirs: &[PathBuf], jobs: &[Job]) -> BTreeMap<PathBuf, Phase> {
    dirs.iter()
        .map(|dir| (dir.clone(), furthest_phase(dir, jobs)))
        .collect()
}
