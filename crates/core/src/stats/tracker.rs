use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{CompletionRecord, PeriodStats, StatsError, StatsSnapshot};
use crate::metrics;
use crate::registry::TorrentRegistry;

/// Tracks transfer totals and completions, persisting them as JSON.
pub struct StatsTracker {
    registry: Arc<TorrentRegistry>,
    path: PathBuf,
    snapshot: Mutex<StatsSnapshot>,
}

impl StatsTracker {
    /// Load statistics from `path`. A missing or corrupt file starts fresh.
    pub fn new(registry: Arc<TorrentRegistry>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = load_snapshot(&path);
        Self {
            registry,
            path,
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Refresh totals from the registry, record new completions and persist.
    ///
    /// Saving failures are logged; the in-memory snapshot is still updated.
    pub async fn update_stats(&self) -> StatsSnapshot {
        let session = self.registry.session_stats().await;
        metrics::TORRENTS_REGISTERED.set(session.num_torrents as i64);

        let mut completed = Vec::new();
        for record in self.registry.records().await {
            match record.handle.status().await {
                Ok(status) if status.is_complete() => completed.push((record, status)),
                Ok(_) => {}
                Err(e) => {
                    warn!(torrent_id = record.id, error = %e, "Skipping torrent in stats update");
                }
            }
        }

        let snapshot = {
            let mut snapshot = self.snapshot.lock().await;
            snapshot.total_downloaded = session.total_download;
            snapshot.total_uploaded = session.total_upload;

            let now = Utc::now();
            for (record, status) in completed {
                let info_hash = record.handle.info_hash();
                if snapshot.has_completion(record.id, &info_hash) {
                    continue;
                }
                info!(torrent_id = record.id, name = %record.handle.name(), "Torrent completed");
                snapshot.history.push(CompletionRecord {
                    torrent_id: record.id,
                    info_hash,
                    name: record.handle.name(),
                    size_bytes: status.total_wanted,
                    completed_at: now,
                });
                snapshot.torrents_completed += 1;
                metrics::COMPLETIONS_RECORDED.inc();
            }
            snapshot.clone()
        };

        if let Err(e) = self.write(&snapshot).await {
            warn!(path = %self.path.display(), error = %e, "Failed to save statistics");
        }
        snapshot
    }

    /// Persist the current snapshot.
    pub async fn save(&self) -> Result<(), StatsError> {
        let snapshot = self.snapshot.lock().await.clone();
        self.write(&snapshot).await
    }

    async fn write(&self, snapshot: &StatsSnapshot) -> Result<(), StatsError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "Statistics saved");
        Ok(())
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// Completions on today's (UTC) date.
    pub async fn daily_stats(&self) -> PeriodStats {
        self.daily_stats_at(Utc::now()).await
    }

    /// Completions in the trailing seven days.
    pub async fn weekly_stats(&self) -> PeriodStats {
        self.weekly_stats_at(Utc::now()).await
    }

    pub async fn daily_stats_at(&self, now: DateTime<Utc>) -> PeriodStats {
        let today = now.date_naive();
        let snapshot = self.snapshot.lock().await;
        PeriodStats::from_records(
            snapshot
                .history
                .iter()
                .filter(|r| r.completed_at.date_naive() == today),
        )
    }

    pub async fn weekly_stats_at(&self, now: DateTime<Utc>) -> PeriodStats {
        let since = now - ChronoDuration::days(7);
        let snapshot = self.snapshot.lock().await;
        PeriodStats::from_records(snapshot.history.iter().filter(|r| r.completed_at >= since))
    }
}

fn load_snapshot(path: &Path) -> StatsSnapshot {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StatsSnapshot::new(Utc::now()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read statistics, starting fresh");
            return StatsSnapshot::new(Utc::now());
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt statistics file, starting fresh");
        StatsSnapshot::new(Utc::now())
    })
}
