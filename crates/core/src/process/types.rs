//! Types describing OS processes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    /// Short executable name (`comm`).
    pub name: String,
    pub cmdline: Vec<String>,
}

/// Accumulated CPU time in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    /// Block I/O wait, when the kernel reports it.
    pub iowait: Option<f64>,
}

/// Scheduler state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Other(char),
}

impl RunStatus {
    /// Maps a `/proc/<pid>/stat` state letter.
    pub fn from_state_char(state: char) -> Self {
        match state {
            'R' => Self::Running,
            'S' | 'I' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' | 't' => Self::Stopped,
            'Z' => Self::Zombie,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUN"),
            Self::Sleeping => write!(f, "SLP"),
            Self::DiskSleep => write!(f, "DSK"),
            Self::Stopped => write!(f, "STP"),
            Self::Zombie => write!(f, "ZMB"),
            Self::Other(c) => write!(f, "{}", c),
        }
    }
}

/// Signals the scheduler sends to plot jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Suspend,
    Resume,
    Terminate,
}

/// Point-in-time resource snapshot of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub cpu: CpuTimes,
    pub memory_bytes: u64,
}
