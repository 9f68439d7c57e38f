//! Types for the scheduler.

use serde::Serialize;
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveOutcome, ArchiveTransfer};
use crate::job::{JobError, JobSummary};
use crate::process::ProcessError;

/// Errors that can occur during a scheduler tick or job command.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The process table could not be read.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// The archive attempt failed.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Acting on a job failed.
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// No running job has a plot id with this prefix.
    #[error("no job matches plot id prefix {0}")]
    NoMatchingJob(String),

    /// More than one running job has a plot id with this prefix.
    #[error("plot id prefix {prefix} matches {count} jobs")]
    AmbiguousPrefix { prefix: String, count: usize },
}

impl SchedulerError {
    /// Whether the daemon has to stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Archive(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// What to do to a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Suspend,
    Resume,
    Kill,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub jobs: Vec<JobSummary>,
    pub archive_status: String,
    pub transfers: Vec<ArchiveTransfer>,
    #[serde(skip)]
    pub outcome: ArchiveOutcome,
}

impl TickReport {
    pub fn new(jobs: Vec<JobSummary>, outcome: ArchiveOutcome) -> Self {
        Self {
            jobs,
            archive_status: outcome.status(),
            transfers: outcome.transfers().to_vec(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::RefusalReason;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_fatal_errors() {
        let fatal = SchedulerError::from(ArchiveError::LogFile {
            path: PathBuf::from("/logs/archive_out_a.log"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert!(fatal.is_fatal());
        assert!(!SchedulerError::NoMatchingJob("abc".into()).is_fatal());
        assert!(!SchedulerError::from(ProcessError::other("boom")).is_fatal());
    }

    #[test]
    fn test_report_serialization() {
        let report = TickReport::new(
            Vec::new(),
            ArchiveOutcome::Refused {
                reason: RefusalReason::NoPlots,
                transfers: Vec::new(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["archive_status"], "no plots found");
        assert!(json["jobs"].as_array().unwrap().is_empty());
        assert!(json.get("outcome").is_none());
    }
}
