//! Transfer statistics and completion history.

mod tracker;
mod types;

pub use tracker::StatsTracker;
pub use types::{CompletionRecord, PeriodStats, StatsError, StatsSnapshot};
