//! Periodic scheduling: job discovery plus one archive decision per tick.

mod runner;
mod types;

pub use runner::Scheduler;
pub use types::{JobAction, SchedulerError, TickReport};
