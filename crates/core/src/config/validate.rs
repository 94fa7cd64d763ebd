use super::{types::Config, ConfigError};
use crate::engine::MAX_PRIORITY;
use crate::scheduler::ScheduleEntry;

/// Validate configuration
/// Currently validates:
/// - Loop intervals are not 0
/// - Priorities are within 0-7
/// - Schedules parse (operation, time, days)
/// - Feed and rule ids are unique
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let intervals = [
        ("scheduler.tick_secs", config.scheduler.tick_secs),
        ("rss.tick_secs", config.rss.tick_secs),
        ("rss.fetch_timeout_secs", config.rss.fetch_timeout_secs),
        ("automation.tick_secs", config.automation.tick_secs),
        ("monitor.refresh_ms", config.monitor.refresh_ms),
    ];
    for (name, value) in intervals {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{name} cannot be 0")));
        }
    }

    for torrent in &config.torrents {
        check_priority(&format!("torrent {}", torrent.source), torrent.priority)?;
    }

    for schedule in &config.schedules {
        ScheduleEntry::from_config(schedule).map_err(|e| {
            ConfigError::ValidationError(format!("schedule {}: {}", schedule.id, e))
        })?;
    }

    let mut feed_ids = std::collections::HashSet::new();
    for feed in &config.feeds {
        if !feed_ids.insert(feed.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate feed id: {}",
                feed.id
            )));
        }
        for filter in &feed.filters {
            check_priority(&format!("feed {} filter {}", feed.id, filter.pattern), filter.priority)?;
        }
    }

    let mut rule_ids = std::collections::HashSet::new();
    for rule in &config.rules {
        if !rule_ids.insert(rule.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate rule id: {}",
                rule.id
            )));
        }
    }

    Ok(())
}

fn check_priority(what: &str, priority: u8) -> Result<(), ConfigError> {
    if priority > MAX_PRIORITY {
        return Err(ConfigError::ValidationError(format!(
            "{what}: priority {priority} is outside 0-{MAX_PRIORITY}"
        )));
    }
    Ok(())
}
