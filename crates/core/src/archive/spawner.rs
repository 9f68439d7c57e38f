//! Starting transfer processes.

use std::fs::File;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

use super::command::TransferCommand;

/// Starts a transfer that outlives the tick that launched it.
pub trait TransferSpawner: Send + Sync {
    /// Spawns `command` with stdout and stderr going to `log`, returning the
    /// child pid.
    fn spawn(&self, command: &TransferCommand, log: File) -> io::Result<u32>;
}

/// Spawns transfers in their own process group so terminal signals sent to
/// the scheduler do not reach them.
#[derive(Debug, Default, Clone)]
pub struct DetachedSpawner;

impl TransferSpawner for DetachedSpawner {
    fn spawn(&self, command: &TransferCommand, log: File) -> io::Result<u32> {
        let stderr = log.try_clone()?;
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .process_group(0)
            .spawn()?;

        let pid = child.id();
        // Reap the child when it exits.
        thread::Builder::new()
            .name(format!("transfer-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) => debug!(pid, %status, "transfer exited"),
                Err(e) => debug!(pid, error = %e, "cannot wait for transfer"),
            })?;

        Ok(pid)
    }
}
