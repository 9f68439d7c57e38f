//! Error types for the job module.

use std::path::PathBuf;
use thiserror::Error;

use super::command::PlotCommandError;
use crate::process::ProcessError;

/// Errors that prevent building or driving a plot job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The command line is not a usable plot job.
    #[error("invalid plot command: {0}")]
    Command(#[from] PlotCommandError),

    /// Two different files under the log root are open by one process.
    #[error("process {pid} has conflicting log files: {first} and {second}")]
    LogFileConflict {
        pid: u32,
        first: PathBuf,
        second: PathBuf,
    },

    /// Process introspection or signalling failed.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// Reading a log or a directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Whether the candidate just disappeared or is not ours to inspect.
    pub fn is_skippable(&self) -> bool {
        match self {
            Self::Process(e) => e.is_skippable(),
            _ => false,
        }
    }
}
