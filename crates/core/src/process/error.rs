//! Error types for the process module.

use thiserror::Error;

/// Errors raised while inspecting or signalling an OS process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process exited between listing and inspection.
    #[error("process {pid} vanished")]
    Vanished { pid: u32 },

    /// Not allowed to inspect or signal the process.
    #[error("access denied to process {pid}")]
    AccessDenied { pid: u32 },

    /// I/O error reading process information.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other introspection failure.
    #[error("process introspection failed: {reason}")]
    Other { reason: String },
}

impl ProcessError {
    /// Creates a new generic introspection error.
    pub fn other(reason: impl Into<String>) -> Self {
        Self::Other {
            reason: reason.into(),
        }
    }

    /// Whether the failure only concerns one process that may be skipped.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Vanished { .. } | Self::AccessDenied { .. })
    }
}
