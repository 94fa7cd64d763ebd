use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::engine::{EngineError, TorrentHandle, TorrentStatus, DEFAULT_PRIORITY};

/// Session-local torrent identifier, assigned from 1 upward and never reused.
pub type TorrentId = u64;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Torrent not found: {0}")]
    TorrentNotFound(TorrentId),

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid torrent: {0}")]
    InvalidFormat(String),

    #[error("Torrent already registered as {0}")]
    Duplicate(TorrentId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RegistryError {
    /// True for a missing id or a missing source file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::TorrentNotFound(_) | RegistryError::SourceNotFound(_)
        )
    }
}

/// Options applied when adding a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// 0-7.
    pub priority: u8,
    pub sequential: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            sequential: false,
        }
    }
}

impl AddOptions {
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }
}

/// A registered torrent.
#[derive(Clone)]
pub struct TorrentRecord {
    pub id: TorrentId,
    pub handle: Arc<dyn TorrentHandle>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for TorrentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorrentRecord")
            .field("id", &self.id)
            .field("name", &self.handle.name())
            .field("info_hash", &self.handle.info_hash())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A record paired with its current status.
#[derive(Debug, Clone, Serialize)]
pub struct TorrentListing {
    pub id: TorrentId,
    pub name: String,
    pub info_hash: String,
    pub status: TorrentStatus,
}

/// Aggregated transfer figures over every registered torrent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Bytes downloaded this session.
    pub total_download: u64,
    /// Bytes uploaded this session.
    pub total_upload: u64,
    /// Bytes/second.
    pub download_rate: u64,
    /// Bytes/second.
    pub upload_rate: u64,
    pub num_peers: u32,
    pub num_torrents: usize,
}
