//! Types for the download engine boundary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest priority accepted for torrents and files.
pub const MAX_PRIORITY: u8 = 7;

/// Priority applied to new torrents unless the caller overrides it.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Errors surfaced by a download engine backend.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("{operation} is not supported by the {backend} engine")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        EngineError::Unsupported { backend, operation }
    }
}

/// Transfer state reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Waiting for a download slot.
    Queued,
    /// Verifying existing data.
    Checking,
    /// Resolving metadata for a magnet link.
    DownloadingMetadata,
    /// Downloading from peers.
    Downloading,
    /// All wanted pieces present, not uploading.
    Finished,
    /// Complete and uploading to peers.
    Seeding,
    /// Paused by the user or a schedule.
    Paused,
    /// Engine reported an error.
    Error,
    Unknown,
}

impl TorrentState {
    /// Returns the machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Queued => "queued",
            TorrentState::Checking => "checking",
            TorrentState::DownloadingMetadata => "downloading_metadata",
            TorrentState::Downloading => "downloading",
            TorrentState::Finished => "finished",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }

    /// Human-readable label used in tables ("Downloading Metadata").
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time status of one torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentStatus {
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Current download rate in bytes/second.
    pub download_rate: u64,
    /// Current upload rate in bytes/second.
    pub upload_rate: u64,
    /// Connected peers.
    pub num_peers: u32,
    /// Connected seeds.
    pub num_seeds: u32,
    /// Bytes of wanted data already on disk.
    pub total_done: u64,
    /// Bytes selected for download.
    pub total_wanted: u64,
    /// Bytes uploaded this session.
    pub total_upload: u64,
    /// Bytes downloaded this session.
    pub total_download: u64,
    pub state: TorrentState,
    pub save_path: String,
    /// Info hash (lowercase hex), if metadata is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
}

impl TorrentStatus {
    /// True once every wanted byte is present.
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    /// True when the torrent is actively transferring.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            TorrentState::Downloading | TorrentState::DownloadingMetadata | TorrentState::Seeding
        )
    }
}

/// A connected peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub ip: String,
    pub port: u16,
    pub client: String,
    /// Peer's own progress (0.0 - 1.0).
    pub progress: f64,
    pub download_rate: u64,
    pub upload_rate: u64,
    /// Engine-specific connection flags bitmask.
    pub flags: u32,
}

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub index: usize,
    pub path: String,
    pub size_bytes: u64,
    pub priority: u8,
}

/// Request to add a new torrent.
#[derive(Debug, Clone)]
pub enum AddTorrentRequest {
    /// Add via magnet URI.
    Magnet {
        uri: String,
        save_path: Option<PathBuf>,
        paused: bool,
    },
    /// Add via torrent descriptor contents.
    Descriptor {
        /// Raw descriptor bytes.
        data: Vec<u8>,
        /// Original filename (for logging).
        filename: Option<String>,
        save_path: Option<PathBuf>,
        paused: bool,
    },
}

impl AddTorrentRequest {
    /// Create a magnet request with default options.
    pub fn magnet(uri: impl Into<String>) -> Self {
        AddTorrentRequest::Magnet {
            uri: uri.into(),
            save_path: None,
            paused: false,
        }
    }

    /// Create a descriptor request with default options.
    pub fn descriptor(data: Vec<u8>) -> Self {
        AddTorrentRequest::Descriptor {
            data,
            filename: None,
            save_path: None,
            paused: false,
        }
    }

    /// Set the original filename of a descriptor request.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let AddTorrentRequest::Descriptor { filename, .. } = &mut self {
            *filename = Some(name.into());
        }
        self
    }

    /// Set the download directory.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        match &mut self {
            AddTorrentRequest::Magnet { save_path, .. }
            | AddTorrentRequest::Descriptor { save_path, .. } => {
                *save_path = Some(path.into());
            }
        }
        self
    }

    /// Set whether to start paused.
    pub fn with_paused(mut self, p: bool) -> Self {
        match &mut self {
            AddTorrentRequest::Magnet { paused, .. }
            | AddTorrentRequest::Descriptor { paused, .. } => {
                *paused = p;
            }
        }
        self
    }

    /// Requested download directory, if any.
    pub fn save_path(&self) -> Option<&Path> {
        match self {
            AddTorrentRequest::Magnet { save_path, .. }
            | AddTorrentRequest::Descriptor { save_path, .. } => save_path.as_deref(),
        }
    }
}

/// Engine-owned reference to one transfer.
///
/// The registry holds handles but never owns the transfer itself; every call
/// is delegated to the engine backend.
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    /// Display name (falls back to a hash prefix before metadata arrives).
    fn name(&self) -> String;

    /// Info hash (lowercase hex).
    fn info_hash(&self) -> String;

    async fn status(&self) -> Result<TorrentStatus, EngineError>;

    async fn pause(&self) -> Result<(), EngineError>;

    async fn resume(&self) -> Result<(), EngineError>;

    async fn priority(&self) -> Result<u8, EngineError>;

    async fn set_priority(&self, priority: u8) -> Result<(), EngineError>;

    async fn files(&self) -> Result<Vec<FileEntry>, EngineError>;

    async fn set_file_priority(&self, index: usize, priority: u8) -> Result<(), EngineError>;

    async fn set_sequential(&self, enabled: bool) -> Result<(), EngineError>;

    async fn set_super_seeding(&self, enabled: bool) -> Result<(), EngineError>;

    async fn force_recheck(&self) -> Result<(), EngineError>;

    async fn trackers(&self) -> Result<Vec<String>, EngineError>;

    async fn add_tracker(&self, url: &str) -> Result<(), EngineError>;

    async fn replace_trackers(&self, urls: Vec<String>) -> Result<(), EngineError>;

    async fn move_storage(&self, path: &Path) -> Result<(), EngineError>;

    /// Per-torrent download cap in bytes/second (0 = unlimited).
    async fn set_download_limit(&self, bytes_per_sec: u64) -> Result<(), EngineError>;

    /// Per-torrent upload cap in bytes/second (0 = unlimited).
    async fn set_upload_limit(&self, bytes_per_sec: u64) -> Result<(), EngineError>;

    async fn peer_info(&self) -> Result<Vec<PeerInfo>, EngineError>;

    /// Number of peers holding each piece.
    async fn piece_availability(&self) -> Result<Vec<u32>, EngineError>;

    /// Serialized torrent descriptor, when metadata is available.
    async fn export_descriptor(&self) -> Result<Vec<u8>, EngineError>;
}

/// Trait for download engine backends.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Add a new torrent and return its handle.
    async fn add(&self, request: AddTorrentRequest) -> Result<Arc<dyn TorrentHandle>, EngineError>;

    /// Detach a torrent from the engine.
    /// If `delete_data` is true, downloaded content is erased too.
    async fn remove(&self, handle: &dyn TorrentHandle, delete_data: bool)
        -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_state_as_str() {
        assert_eq!(TorrentState::Downloading.as_str(), "downloading");
        assert_eq!(TorrentState::Seeding.as_str(), "seeding");
        assert_eq!(TorrentState::Paused.as_str(), "paused");
        assert_eq!(
            TorrentState::DownloadingMetadata.as_str(),
            "downloading_metadata"
        );
    }

    #[test]
    fn test_torrent_state_label() {
        assert_eq!(TorrentState::Seeding.label(), "Seeding");
        assert_eq!(
            TorrentState::DownloadingMetadata.label(),
            "Downloading Metadata"
        );
    }

    #[test]
    fn test_torrent_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TorrentState::Downloading).unwrap(),
            "\"downloading\""
        );
    }

    #[test]
    fn test_add_request_builder() {
        let req = AddTorrentRequest::magnet("magnet:?xt=urn:btih:abc123")
            .with_save_path("/downloads")
            .with_paused(true);

        assert_eq!(req.save_path(), Some(Path::new("/downloads")));
        match req {
            AddTorrentRequest::Magnet { uri, paused, .. } => {
                assert_eq!(uri, "magnet:?xt=urn:btih:abc123");
                assert!(paused);
            }
            _ => panic!("Expected Magnet variant"),
        }
    }

    #[test]
    fn test_descriptor_request_filename() {
        let req = AddTorrentRequest::descriptor(vec![0u8; 10]).with_filename("a.torrent");
        match req {
            AddTorrentRequest::Descriptor { data, filename, .. } => {
                assert_eq!(data.len(), 10);
                assert_eq!(filename.as_deref(), Some("a.torrent"));
            }
            _ => panic!("Expected Descriptor variant"),
        }
    }

    #[test]
    fn test_status_completion() {
        let mut status = TorrentStatus {
            progress: 0.99,
            download_rate: 0,
            upload_rate: 0,
            num_peers: 0,
            num_seeds: 0,
            total_done: 0,
            total_wanted: 0,
            total_upload: 0,
            total_download: 0,
            state: TorrentState::Downloading,
            save_path: "/tmp".into(),
            info_hash: None,
        };
        assert!(!status.is_complete());
        assert!(status.is_active());

        status.progress = 1.0;
        status.state = TorrentState::Paused;
        assert!(status.is_complete());
        assert!(!status.is_active());
    }
}
