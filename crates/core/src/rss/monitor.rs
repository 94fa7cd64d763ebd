use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::fetch::{parse_feed, FeedFetcher};
use super::types::{
    match_title, FeedCheckReport, FeedEntry, FilterRule, PersistedFeed, RssError,
};
use crate::engine::MAX_PRIORITY;
use crate::metrics;
use crate::registry::{AddOptions, RegistryError, TorrentId, TorrentRegistry};
use crate::worker::LoopWorker;

struct RssShared {
    registry: Arc<TorrentRegistry>,
    fetcher: Arc<dyn FeedFetcher>,
    feeds: RwLock<BTreeMap<String, FeedEntry>>,
    filters: RwLock<BTreeMap<String, Vec<FilterRule>>>,
    /// Persisted state of feeds not yet re-added this run.
    restored: Mutex<BTreeMap<String, PersistedFeed>>,
    state_path: Option<PathBuf>,
    /// Serializes feed checks so two passes never submit the same link.
    check_lock: Mutex<()>,
}

impl RssShared {
    async fn check_feed(&self, feed_id: &str) -> Result<FeedCheckReport, RssError> {
        let _guard = self.check_lock.lock().await;

        let url = self
            .feeds
            .read()
            .await
            .get(feed_id)
            .map(|f| f.url.clone())
            .ok_or_else(|| RssError::FeedNotFound(feed_id.to_string()))?;

        let items = match self.fetch_items(&url).await {
            Ok(items) => items,
            Err(e) => {
                metrics::FEED_CHECKS.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let filters = self
            .filters
            .read()
            .await
            .get(feed_id)
            .cloned()
            .unwrap_or_default();

        let mut report = FeedCheckReport {
            feed_id: feed_id.to_string(),
            ..FeedCheckReport::default()
        };

        for item in items {
            let (Some(title), Some(link)) = (item.title, item.link) else {
                continue;
            };
            report.items += 1;

            if self.is_seen(feed_id, &link).await {
                report.already_seen += 1;
                continue;
            }

            let Some(priority) = match_title(&filters, &title) else {
                report.filtered_out += 1;
                continue;
            };

            match self.submit(&link, priority).await {
                Ok(id) => {
                    metrics::FEED_ITEMS_SUBMITTED.with_label_values(&["added"]).inc();
                    info!(feed_id, torrent_id = id, title = %title, "Added torrent from feed");
                    self.mark_seen(feed_id, &link).await;
                    report.added.push(id);
                }
                Err(RssError::Registry(RegistryError::Duplicate(id))) => {
                    metrics::FEED_ITEMS_SUBMITTED
                        .with_label_values(&["duplicate"])
                        .inc();
                    debug!(feed_id, torrent_id = id, title = %title, "Feed item already registered");
                    self.mark_seen(feed_id, &link).await;
                    report.duplicates += 1;
                }
                Err(e) => {
                    metrics::FEED_ITEMS_SUBMITTED.with_label_values(&["failed"]).inc();
                    warn!(feed_id, title = %title, error = %e, "Failed to add torrent from feed");
                    report.failed.push((link, e.to_string()));
                }
            }
        }

        if let Some(feed) = self.feeds.write().await.get_mut(feed_id) {
            feed.last_checked = Some(Utc::now());
        }
        metrics::FEED_CHECKS.with_label_values(&["ok"]).inc();
        self.save_state().await;

        debug!(
            feed_id,
            items = report.items,
            added = report.added.len(),
            "Feed checked"
        );
        Ok(report)
    }

    async fn fetch_items(&self, url: &str) -> Result<Vec<super::FeedItem>, RssError> {
        let body = self.fetcher.fetch(url).await?;
        parse_feed(&body)
    }

    /// Magnets go to the registry as-is; HTTP links are downloaded first.
    async fn submit(&self, link: &str, priority: u8) -> Result<TorrentId, RssError> {
        let options = AddOptions::default().with_priority(priority);
        if link.starts_with("http://") || link.starts_with("https://") {
            let data = self.fetcher.fetch(link).await?;
            let filename = link.rsplit('/').next().map(str::to_string);
            Ok(self.registry.add_descriptor(data, filename, options).await?)
        } else {
            Ok(self.registry.add_with(link, options).await?)
        }
    }

    async fn is_seen(&self, feed_id: &str, link: &str) -> bool {
        self.feeds
            .read()
            .await
            .get(feed_id)
            .is_some_and(|f| f.seen_links.contains(link))
    }

    async fn mark_seen(&self, feed_id: &str, link: &str) {
        if let Some(feed) = self.feeds.write().await.get_mut(feed_id) {
            feed.seen_links.insert(link.to_string());
        }
    }

    async fn check_due_feeds(&self, now: DateTime<Utc>) -> Vec<(String, Result<FeedCheckReport, RssError>)> {
        let due: Vec<String> = self
            .feeds
            .read()
            .await
            .values()
            .filter(|f| f.is_due(now))
            .map(|f| f.feed_id.clone())
            .collect();

        let mut results = Vec::with_capacity(due.len());
        for feed_id in due {
            let result = self.check_feed(&feed_id).await;
            if let Err(ref e) = result {
                warn!(feed_id = %feed_id, error = %e, "Feed check failed");
            }
            results.push((feed_id, result));
        }
        results
    }

    async fn save_state(&self) {
        let Some(path) = self.state_path.as_ref() else {
            return;
        };

        let mut state: BTreeMap<String, PersistedFeed> = self.restored.lock().await.clone();
        for feed in self.feeds.read().await.values() {
            state.insert(
                feed.feed_id.clone(),
                PersistedFeed {
                    last_checked: feed.last_checked,
                    seen_links: feed.seen_links.clone(),
                },
            );
        }

        let json = match serde_json::to_vec_pretty(&state) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize feed state");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            warn!(path = %path.display(), error = %e, "Failed to save feed state");
        }
    }
}

/// Polls RSS feeds and submits matching items to the registry.
///
/// Each feed is checked when its own poll interval has elapsed; the loop
/// cadence only bounds how late a check can be.
pub struct RssMonitor {
    shared: Arc<RssShared>,
    worker: LoopWorker,
    tick: Duration,
}

impl RssMonitor {
    pub fn new(
        registry: Arc<TorrentRegistry>,
        fetcher: Arc<dyn FeedFetcher>,
        tick: Duration,
        state_path: Option<PathBuf>,
    ) -> Self {
        let restored = state_path
            .as_deref()
            .map(load_state)
            .unwrap_or_default();

        Self {
            shared: Arc::new(RssShared {
                registry,
                fetcher,
                feeds: RwLock::new(BTreeMap::new()),
                filters: RwLock::new(BTreeMap::new()),
                restored: Mutex::new(restored),
                state_path,
                check_lock: Mutex::new(()),
            }),
            worker: LoopWorker::new("RSS monitor"),
            tick,
        }
    }

    /// Register a feed. Re-adding an id updates its URL and interval but
    /// keeps its seen links.
    pub async fn add_feed(&self, feed_id: &str, url: &str, poll_interval: Duration) {
        let restored = self.shared.restored.lock().await.remove(feed_id);
        let mut feeds = self.shared.feeds.write().await;

        match feeds.get_mut(feed_id) {
            Some(feed) => {
                feed.url = url.to_string();
                feed.poll_interval = poll_interval;
            }
            None => {
                let restored = restored.unwrap_or_default();
                feeds.insert(
                    feed_id.to_string(),
                    FeedEntry {
                        feed_id: feed_id.to_string(),
                        url: url.to_string(),
                        poll_interval,
                        last_checked: restored.last_checked,
                        seen_links: restored.seen_links,
                    },
                );
            }
        }
        info!(feed_id, url, poll_secs = poll_interval.as_secs(), "Feed added");
    }

    /// Drop a feed and its filters.
    pub async fn remove_feed(&self, feed_id: &str) -> Result<(), RssError> {
        self.shared
            .feeds
            .write()
            .await
            .remove(feed_id)
            .ok_or_else(|| RssError::FeedNotFound(feed_id.to_string()))?;
        self.shared.filters.write().await.remove(feed_id);
        info!(feed_id, "Feed removed");
        Ok(())
    }

    /// Append a title filter to an existing feed.
    pub async fn add_filter(
        &self,
        feed_id: &str,
        pattern: &str,
        priority: u8,
    ) -> Result<(), RssError> {
        if priority > MAX_PRIORITY {
            return Err(RssError::InvalidArgument(format!(
                "priority must be between 0 and {}, got {}",
                MAX_PRIORITY, priority
            )));
        }
        if !self.shared.feeds.read().await.contains_key(feed_id) {
            return Err(RssError::FeedNotFound(feed_id.to_string()));
        }

        self.shared
            .filters
            .write()
            .await
            .entry(feed_id.to_string())
            .or_default()
            .push(FilterRule {
                feed_id: feed_id.to_string(),
                pattern: pattern.to_string(),
                priority,
            });
        debug!(feed_id, pattern, priority, "Filter added");
        Ok(())
    }

    pub async fn feeds(&self) -> Vec<FeedEntry> {
        self.shared.feeds.read().await.values().cloned().collect()
    }

    pub async fn feed(&self, feed_id: &str) -> Option<FeedEntry> {
        self.shared.feeds.read().await.get(feed_id).cloned()
    }

    pub async fn filters(&self, feed_id: &str) -> Vec<FilterRule> {
        self.shared
            .filters
            .read()
            .await
            .get(feed_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Check one feed now, regardless of its interval.
    pub async fn check_feed(&self, feed_id: &str) -> Result<FeedCheckReport, RssError> {
        self.shared.check_feed(feed_id).await
    }

    /// Check every feed whose interval has elapsed at `now`.
    pub async fn check_due_feeds(
        &self,
        now: DateTime<Utc>,
    ) -> Vec<(String, Result<FeedCheckReport, RssError>)> {
        self.shared.check_due_feeds(now).await
    }

    /// Start the background loop. Calling it twice is harmless.
    pub async fn start_rss_monitor(&self) {
        let shared = Arc::clone(&self.shared);
        self.worker
            .start(self.tick, move || {
                let shared = Arc::clone(&shared);
                async move {
                    shared.check_due_feeds(Utc::now()).await;
                }
            })
            .await;
    }

    /// Stop the loop, waiting for an in-flight check to finish.
    pub async fn stop_rss_monitor(&self) {
        self.worker.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.worker.is_running().await
    }
}

fn load_state(path: &std::path::Path) -> BTreeMap<String, PersistedFeed> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read feed state, starting fresh");
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt feed state, starting fresh");
        BTreeMap::new()
    })
}
