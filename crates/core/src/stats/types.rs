use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::TorrentId;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize statistics: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One torrent that reached 100%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub torrent_id: TorrentId,
    /// Distinguishes ids reused by a later session.
    #[serde(default)]
    pub info_hash: String,
    pub name: String,
    pub size_bytes: u64,
    pub completed_at: DateTime<Utc>,
}

/// Persisted transfer statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_downloaded: u64,
    pub total_uploaded: u64,
    pub torrents_completed: u64,
    pub session_start: DateTime<Utc>,
    /// Append-only.
    #[serde(default)]
    pub history: Vec<CompletionRecord>,
}

impl StatsSnapshot {
    pub fn new(session_start: DateTime<Utc>) -> Self {
        Self {
            total_downloaded: 0,
            total_uploaded: 0,
            torrents_completed: 0,
            session_start,
            history: Vec::new(),
        }
    }

    /// Whether a completion for this torrent is already recorded.
    pub fn has_completion(&self, torrent_id: TorrentId, info_hash: &str) -> bool {
        self.history
            .iter()
            .any(|r| r.torrent_id == torrent_id && r.info_hash == info_hash)
    }
}

/// Completions within a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub completed: usize,
    pub total_bytes: u64,
    pub records: Vec<CompletionRecord>,
}

impl PeriodStats {
    pub(crate) fn from_records<'a>(records: impl Iterator<Item = &'a CompletionRecord>) -> Self {
        let records: Vec<CompletionRecord> = records.cloned().collect();
        Self {
            completed: records.len(),
            total_bytes: records.iter().map(|r| r.size_bytes).sum(),
            records,
        }
    }
}
