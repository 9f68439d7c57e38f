//! Plot jobs: recognizing plotting processes, building `Job`s from them and
//! keeping the pid-keyed registry that the scheduler reads every tick.

mod aggregate;
mod command;
mod error;
mod plot_job;
mod registry;

pub use aggregate::{
    dst_dirs_to_furthest_phase, furthest_phase, phases_for_dst_dir, phases_for_tmp_dir,
};
pub use command::{is_plotting_cmdline, PlotCommand, PlotCommandError, PlotEngine};
pub use error::JobError;
pub use plot_job::{Job, JobStats, JobSummary, UNKNOWN_PLOT_ID};
pub use registry::{JobRegistry, LogReadPolicy};
