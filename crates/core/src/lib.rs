pub mod archive;
pub mod config;
pub mod disk;
pub mod job;
pub mod metrics;
pub mod phase;
pub mod process;
pub mod scheduler;
pub mod testing;

pub use archive::{ArchiveError, ArchiveLauncher, ArchiveOutcome, ArchiveTransfer};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use disk::{DiskSpace, StatvfsDisk};
pub use job::{Job, JobError, JobRegistry, PlotCommand};
pub use phase::{LogDialect, Phase};
pub use process::{ProcessDirectory, ProcessError};
pub use scheduler::{JobAction, Scheduler, SchedulerError, TickReport};
