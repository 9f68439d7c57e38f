//! OS process introspection.
//!
//! `ProcessDirectory` is the narrow view of the process table used by job
//! discovery and archive transfer detection. `ProcfsDirectory` reads
//! `/proc` on Linux; `testing::MockProcessDirectory` scripts a table.

mod error;
#[cfg(target_os = "linux")]
mod procfs_directory;
mod traits;
mod types;

pub use error::ProcessError;
#[cfg(target_os = "linux")]
pub use procfs_directory::ProcfsDirectory;
pub use traits::ProcessDirectory;
pub use types::{CpuTimes, ProcessInfo, ProcessSignal, ProcessStats, RunStatus};
