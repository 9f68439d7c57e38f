//! Archive scheduling.
//!
//! Finished plots sit in destination directories until they are moved to the
//! archive host. Every tick the launcher counts running transfers, scores the
//! destination directories, probes the archive for room and starts at most
//! one `rsync`. The transfer log created for each plot is the only lock
//! between concurrent schedulers.

mod command;
mod error;
mod exclusive;
mod launcher;
mod plots;
mod priority;
mod remote;
mod selector;
mod spawner;
mod transfers;

pub use command::TransferCommand;
pub use error::ArchiveError;
pub use exclusive::{archive_log_path, create_exclusive};
pub use launcher::{
    ArchiveLauncher, ArchiveOutcome, RefusalReason, SkipReason, LOCAL_TRANSFER_MULTIPLIER,
    PENDING_PLACEHOLDER_TICKS,
};
pub use plots::{expected_plot_size, list_completed_plots};
pub use priority::compute_priority;
pub use remote::{parse_df_output, ArchiveSpaceProbe, DfSpaceProbe, ProbeError};
pub use selector::{select_plot, PlotCandidate};
pub use spawner::{DetachedSpawner, TransferSpawner};
pub use transfers::{detect_transfers, rsync_dest, ArchiveTransfer, TRANSFER_PROCESS_NAME};
