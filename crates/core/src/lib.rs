pub mod automation;
pub mod backup;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod rss;
pub mod scheduler;
pub mod stats;
pub mod testing;
mod worker;

pub use automation::{
    AutomationEngine, AutomationError, AutomationRule, FnAction, FnCondition, RuleReport,
};
pub use backup::{BackupError, BackupManager, BackupSnapshot, RestoreReport};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError,
};
pub use engine::{create_engine, EngineError, TorrentEngine, TorrentHandle, TorrentState};
pub use monitor::{MonitorOptions, MonitorSnapshot};
pub use registry::{AddOptions, RegistryError, TorrentId, TorrentRegistry};
pub use rss::{FeedFetcher, HttpFeedFetcher, RssError, RssMonitor};
pub use scheduler::{ScheduleEntry, ScheduleOperation, Scheduler, SchedulerError};
pub use stats::{StatsError, StatsSnapshot, StatsTracker};
