//! Error types for archive scheduling.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::process::ProcessError;

/// Failures of an archive attempt. Refusals are outcomes, not errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The per-plot transfer log could not be created for a reason other
    /// than it already existing. Points at a broken log directory.
    #[error("unable to create archive log {path}, check that the directory exists and is writable: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transfer process could not be started.
    #[error("failed to start transfer of {plot}: {source}")]
    Spawn {
        plot: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process table could not be read.
    #[error("cannot list running transfers: {0}")]
    Process(#[from] ProcessError),
}

impl ArchiveError {
    /// Whether the scheduler must stop instead of retrying next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LogFile { .. })
    }
}
