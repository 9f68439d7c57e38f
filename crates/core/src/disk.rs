//! Free space of local directories.

use nix::sys::statvfs::statvfs;
use std::io;
use std::path::Path;

/// Bytes in a (decimal) gigabyte, the unit priorities are computed in.
pub const GB: u64 = 1_000_000_000;

/// Reports free bytes for a directory.
pub trait DiskSpace: Send + Sync {
    fn free_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// `statvfs(2)` backed disk space, counting blocks available to
/// unprivileged users.
#[derive(Debug, Default, Clone)]
pub struct StatvfsDisk;

impl DiskSpace for StatvfsDisk {
    fn free_bytes(&self, path: &Path) -> io::Result<u64> {
        let stat = statvfs(path).map_err(io::Error::from)?;
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }
}
