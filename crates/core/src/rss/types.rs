use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::engine::DEFAULT_PRIORITY;
use crate::registry::{RegistryError, TorrentId};

/// Errors from the RSS monitor.
#[derive(Debug, Error)]
pub enum RssError {
    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A polled feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub feed_id: String,
    pub url: String,
    pub poll_interval: Duration,
    pub last_checked: Option<DateTime<Utc>>,
    /// Links already submitted; only ever grows.
    pub seen_links: BTreeSet<String>,
}

impl FeedEntry {
    /// True when the feed has never been checked or its interval has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed >= self.poll_interval)
                .unwrap_or(false),
        }
    }
}

/// Case-insensitive title substring filter on one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub feed_id: String,
    pub pattern: String,
    /// Priority given to torrents added through this filter.
    pub priority: u8,
}

impl FilterRule {
    pub fn matches(&self, title: &str) -> bool {
        title.to_lowercase().contains(&self.pattern.to_lowercase())
    }
}

/// Priority to add `title` with, or `None` if no filter accepts it.
///
/// A feed without filters accepts every title at the default priority.
pub fn match_title(filters: &[FilterRule], title: &str) -> Option<u8> {
    if filters.is_empty() {
        return Some(DEFAULT_PRIORITY);
    }
    filters
        .iter()
        .find(|f| f.matches(title))
        .map(|f| f.priority)
}

/// One item of a fetched feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
}

/// Outcome of checking one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCheckReport {
    pub feed_id: String,
    /// Items carrying both a title and a link.
    pub items: usize,
    /// Items skipped because their link was already submitted.
    pub already_seen: usize,
    /// Items rejected by every filter.
    pub filtered_out: usize,
    /// Torrents newly added to the registry.
    pub added: Vec<TorrentId>,
    /// Links the registry already held.
    pub duplicates: usize,
    /// Links and error messages of failed submissions.
    pub failed: Vec<(String, String)>,
}

/// Per-feed state written to disk between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedFeed {
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seen_links: BTreeSet<String>,
}
