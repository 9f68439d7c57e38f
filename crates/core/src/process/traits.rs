//! Trait definitions for the process module.

use std::path::PathBuf;

use super::error::ProcessError;
use super::types::{ProcessInfo, ProcessSignal, ProcessStats};

/// Read and control access to the OS process table.
///
/// Discovery, phase inference and transfer detection only see processes
/// through this trait, so they can run against a scripted table in tests.
pub trait ProcessDirectory: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Lists every process currently visible. Processes that vanish or
    /// deny access while listing are left out.
    fn processes(&self) -> Result<Vec<ProcessInfo>, ProcessError>;

    /// Current working directory of a process.
    fn cwd(&self, pid: u32) -> Result<PathBuf, ProcessError>;

    /// Paths of regular files the process holds open.
    fn open_files(&self, pid: u32) -> Result<Vec<PathBuf>, ProcessError>;

    /// Status, start time, CPU times and memory of a process.
    fn stats(&self, pid: u32) -> Result<ProcessStats, ProcessError>;

    /// Delivers a signal to a process.
    fn signal(&self, pid: u32, signal: ProcessSignal) -> Result<(), ProcessError>;
}
