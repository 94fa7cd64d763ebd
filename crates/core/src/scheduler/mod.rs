//! Time-of-day scheduling of torrent operations.

mod runner;
mod types;

pub use runner::Scheduler;
pub use types::{
    parse_days, parse_time_of_day, ScheduleEntry, ScheduleOperation, ScheduleReport,
    SchedulerError,
};
