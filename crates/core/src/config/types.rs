use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::DEFAULT_PRIORITY;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rss: RssConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Torrents added when `tamer run` starts.
    #[serde(default)]
    pub torrents: Vec<TorrentSourceConfig>,
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Download engine backends.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    #[default]
    Librqbit,
    /// In-memory engine, no network traffic.
    Mock,
}

/// Download engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: EngineBackend,
    /// Directory for downloaded content (`~` is expanded).
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
    /// Session upload cap in KiB/s (0 = unlimited).
    #[serde(default = "default_max_upload")]
    pub max_upload_kbps: u64,
    /// Session download cap in KiB/s (0 = unlimited).
    #[serde(default)]
    pub max_download_kbps: u64,
    /// Resume torrents immediately after adding them.
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    #[serde(default)]
    pub listen_port: Option<u16>,
    /// Directory for engine session state; nothing is persisted when unset.
    #[serde(default)]
    pub persistence_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::default(),
            download_path: default_download_path(),
            max_upload_kbps: default_max_upload(),
            max_download_kbps: 0,
            auto_start: false,
            enable_dht: true,
            listen_port: None,
            persistence_path: None,
        }
    }
}

impl EngineConfig {
    /// Download path with a leading `~` replaced by `$HOME`.
    pub fn resolved_download_path(&self) -> PathBuf {
        expand_home(&self.download_path)
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

fn default_download_path() -> PathBuf {
    PathBuf::from("~/Downloads")
}

fn default_max_upload() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

/// Scheduler loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Seconds between schedule checks.
    #[serde(default = "default_scheduler_tick")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_scheduler_tick(),
        }
    }
}

fn default_scheduler_tick() -> u64 {
    60
}

/// RSS monitor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RssConfig {
    /// Seconds between monitor passes.
    #[serde(default = "default_rss_tick")]
    pub tick_secs: u64,
    /// Timeout for a single feed fetch.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// JSON file holding seen links across restarts.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_rss_tick(),
            fetch_timeout_secs: default_fetch_timeout(),
            state_path: None,
        }
    }
}

fn default_rss_tick() -> u64 {
    300
}

fn default_fetch_timeout() -> u64 {
    30
}

/// Automation loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutomationConfig {
    #[serde(default = "default_automation_tick")]
    pub tick_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_automation_tick(),
        }
    }
}

fn default_automation_tick() -> u64 {
    30
}

/// Statistics persistence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_path")]
    pub path: PathBuf,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            path: default_stats_path(),
        }
    }
}

fn default_stats_path() -> PathBuf {
    PathBuf::from("torrent_stats.json")
}

/// Backup location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
        }
    }
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

/// Live monitor display
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// Peers listed in the peer panel.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            max_peers: default_max_peers(),
        }
    }
}

fn default_refresh_ms() -> u64 {
    1000
}

fn default_max_peers() -> usize {
    10
}

/// A torrent added at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentSourceConfig {
    /// Magnet URI or descriptor path.
    pub source: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub sequential: bool,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// A scheduled operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    pub id: String,
    pub torrent_id: u64,
    /// One of start, stop, pause, resume.
    pub operation: String,
    /// HH:MM, local time.
    pub time: String,
    /// Weekday names; empty means every day.
    #[serde(default)]
    pub days: Vec<String>,
}

/// An RSS feed with its filters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    pub id: String,
    pub url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

fn default_poll_interval() -> u64 {
    3600
}

/// A title filter on a feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    pub pattern: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

/// A built-in automation rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub id: String,
    pub condition: ConditionConfig,
    pub action: ActionConfig,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Built-in rule conditions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionConfig {
    /// Every registered torrent is complete (false when empty).
    AllComplete,
    /// At least one registered torrent is complete.
    AnyComplete,
    /// More than `count` torrents are actively transferring.
    ActiveCountAbove { count: usize },
}

/// Built-in rule actions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionConfig {
    PauseAll,
    ResumeAll,
    RemoveCompleted {
        #[serde(default)]
        delete_data: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.backend, EngineBackend::Librqbit);
        assert_eq!(config.engine.max_upload_kbps, 500);
        assert_eq!(config.engine.max_download_kbps, 0);
        assert!(!config.engine.auto_start);
        assert!(config.engine.enable_dht);
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.rss.tick_secs, 300);
        assert_eq!(config.rss.fetch_timeout_secs, 30);
        assert_eq!(config.stats.path.to_str().unwrap(), "torrent_stats.json");
        assert_eq!(config.backup.dir.to_str().unwrap(), "backups");
        assert!(config.schedules.is_empty());
    }

    #[test]
    fn test_deserialize_engine_section() {
        let toml = r#"
[engine]
backend = "mock"
download_path = "/data/torrents"
auto_start = true
listen_port = 6881
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.backend, EngineBackend::Mock);
        assert_eq!(
            config.engine.resolved_download_path(),
            PathBuf::from("/data/torrents")
        );
        assert!(config.engine.auto_start);
        assert_eq!(config.engine.listen_port, Some(6881));
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home(std::path::Path::new("~/Downloads"));
        if std::env::var_os("HOME").is_some() {
            assert!(!expanded.starts_with("~"));
            assert!(expanded.ends_with("Downloads"));
        }
        assert_eq!(
            expand_home(std::path::Path::new("/abs/path")),
            PathBuf::from("/abs/path")
        );
    }

    #[test]
    fn test_deserialize_schedules_and_feeds() {
        let toml = r#"
[[schedules]]
id = "morning_start"
torrent_id = 1
operation = "start"
time = "09:00"
days = ["monday", "friday"]

[[feeds]]
id = "linux_iso"
url = "https://example.com/linux.rss"

[[feeds.filters]]
pattern = "Ubuntu"
priority = 7

[[feeds.filters]]
pattern = "Debian"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.schedules.len(), 1);
        assert_eq!(config.schedules[0].days, vec!["monday", "friday"]);

        let feed = &config.feeds[0];
        assert_eq!(feed.poll_interval_secs, 3600);
        assert_eq!(feed.filters.len(), 2);
        assert_eq!(feed.filters[0].priority, 7);
        assert_eq!(feed.filters[1].priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_deserialize_rules() {
        let toml = r#"
[[rules]]
id = "tidy"
condition = { kind = "any_complete" }
action = { kind = "remove_completed", delete_data = false }

[[rules]]
id = "throttle"
enabled = false
condition = { kind = "active_count_above", count = 3 }
action = { kind = "pause_all" }
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.rules.len(), 2);
        assert!(config.rules[0].enabled);
        assert_eq!(config.rules[0].condition, ConditionConfig::AnyComplete);
        assert_eq!(
            config.rules[0].action,
            ActionConfig::RemoveCompleted { delete_data: false }
        );
        assert!(!config.rules[1].enabled);
        assert_eq!(
            config.rules[1].condition,
            ConditionConfig::ActiveCountAbove { count: 3 }
        );
    }
}
