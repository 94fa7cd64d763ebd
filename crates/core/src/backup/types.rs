use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::TorrentId;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Invalid backup name: {0}")]
    InvalidName(String),

    #[error("Invalid backup file: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize backup: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    pub path: String,
    pub size: u64,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTorrent {
    pub torrent_id: TorrentId,
    pub name: String,
    pub save_path: String,
    pub priority: u8,
    pub info_hash: String,
    #[serde(default)]
    pub files: Vec<BackupFile>,
}

/// Point-in-time description of every registered torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub timestamp: DateTime<Utc>,
    pub torrents: Vec<BackupTorrent>,
}

/// What restoring a backup would bring back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<RestoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreEntry {
    pub torrent: BackupTorrent,
    /// An engine handle with the same info hash is registered right now.
    pub currently_registered: bool,
}

impl RestoreReport {
    /// Entries not currently registered.
    pub fn missing(&self) -> impl Iterator<Item = &BackupTorrent> {
        self.entries
            .iter()
            .filter(|e| !e.currently_registered)
            .map(|e| &e.torrent)
    }
}
