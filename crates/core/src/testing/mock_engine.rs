//! Mock download engine for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{
    parse_descriptor, parse_magnet, AddTorrentRequest, EngineError, FileEntry, PeerInfo,
    TorrentEngine, TorrentHandle, TorrentState, TorrentStatus, DEFAULT_PRIORITY,
};

/// Size reported for magnet torrents, which carry no file list.
const MAGNET_SIZE: u64 = 100 * 1024 * 1024;

/// A recorded add request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    /// The request that was made.
    pub request: AddTorrentRequest,
    /// When the request was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// A recorded remove call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRemove {
    pub info_hash: String,
    pub delete_data: bool,
}

/// Mock implementation of the TorrentEngine trait.
///
/// Provides controllable behavior for testing:
/// - Track added and removed torrents for assertions
/// - Control progress, speeds and state per torrent
/// - Simulate engine and per-handle failures
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockEngine::new();
/// let handle = engine.add(AddTorrentRequest::magnet("magnet:?xt=urn:btih:abc")).await?;
///
/// engine.set_progress("abc", 1.0).await;
/// assert_eq!(handle.status().await?.state, TorrentState::Seeding);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    /// Recorded add calls.
    added: Arc<RwLock<Vec<RecordedAdd>>>,
    /// Recorded remove calls.
    removed: Arc<RwLock<Vec<RecordedRemove>>>,
    /// Live handles by info hash.
    handles: Arc<RwLock<HashMap<String, Arc<MockHandle>>>>,
    /// If set, the next add or remove will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// Time every add spends before returning its handle.
    add_delay: Arc<RwLock<Option<Duration>>>,
    /// Default save path for new torrents.
    default_save_path: String,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self {
            added: Arc::new(RwLock::new(Vec::new())),
            removed: Arc::new(RwLock::new(Vec::new())),
            handles: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            add_delay: Arc::new(RwLock::new(None)),
            default_save_path: "/mock/downloads".to_string(),
        }
    }

    /// Create a mock engine with a custom save path.
    pub fn with_save_path(save_path: impl Into<String>) -> Self {
        Self {
            default_save_path: save_path.into(),
            ..Self::new()
        }
    }

    /// Get all recorded add calls.
    pub async fn added_requests(&self) -> Vec<RecordedAdd> {
        self.added.read().await.clone()
    }

    /// Get all recorded remove calls.
    pub async fn removed(&self) -> Vec<RecordedRemove> {
        self.removed.read().await.clone()
    }

    /// Configure the next add or remove to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every add wait this long after the engine has taken the torrent.
    pub async fn set_add_delay(&self, delay: Duration) {
        *self.add_delay.write().await = Some(delay);
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.handles.read().await.contains_key(hash)
    }

    /// Get the number of torrents.
    pub async fn torrent_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Get the handle for a hash.
    pub async fn handle(&self, hash: &str) -> Option<Arc<MockHandle>> {
        self.handles.read().await.get(hash).cloned()
    }

    /// Set the progress for a torrent (0.0 to 1.0).
    ///
    /// When progress reaches 1.0 an unpaused torrent starts seeding.
    pub async fn set_progress(&self, hash: &str, progress: f64) {
        if let Some(handle) = self.handle(hash).await {
            handle.set_progress(progress).await;
        }
    }

    /// Set the download/upload rates for a torrent.
    pub async fn set_speeds(&self, hash: &str, download: u64, upload: u64) {
        if let Some(handle) = self.handle(hash).await {
            let mut state = handle.state.write().await;
            state.status.download_rate = download;
            state.status.upload_rate = upload;
        }
    }

    /// Set session transfer totals for a torrent.
    pub async fn set_transferred(&self, hash: &str, downloaded: u64, uploaded: u64) {
        if let Some(handle) = self.handle(hash).await {
            let mut state = handle.state.write().await;
            state.status.total_download = downloaded;
            state.status.total_upload = uploaded;
        }
    }

    /// Set the state for a torrent directly.
    pub async fn set_state(&self, hash: &str, torrent_state: TorrentState) {
        if let Some(handle) = self.handle(hash).await {
            handle.state.write().await.status.state = torrent_state;
        }
    }

    /// Replace the connected peers of a torrent.
    pub async fn set_peers(&self, hash: &str, peers: Vec<PeerInfo>) {
        if let Some(handle) = self.handle(hash).await {
            let mut state = handle.state.write().await;
            state.status.num_peers = peers.len() as u32;
            state.status.num_seeds = peers.iter().filter(|p| p.progress >= 1.0).count() as u32;
            state.peers = peers;
        }
    }

    /// Replace the piece availability of a torrent.
    pub async fn set_pieces(&self, hash: &str, pieces: Vec<u32>) {
        if let Some(handle) = self.handle(hash).await {
            handle.state.write().await.pieces = pieces;
        }
    }

    /// Report priority, files, trackers and peers as unsupported, the way a
    /// backend without those details does.
    pub async fn set_details_unsupported(&self, hash: &str, unsupported: bool) {
        if let Some(handle) = self.handle(hash).await {
            handle.state.write().await.details_unsupported = unsupported;
        }
    }

    /// Make every call on a torrent's handle fail.
    pub async fn set_failing(&self, hash: &str, failing: bool) {
        if let Some(handle) = self.handle(hash).await {
            handle.state.write().await.failing = failing;
        }
    }

    async fn take_error(&self) -> Option<EngineError> {
        self.next_error.write().await.take()
    }

    fn build_handle(&self, request: &AddTorrentRequest) -> Result<MockHandle, EngineError> {
        let save_path = request
            .save_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.default_save_path.clone());

        match request {
            AddTorrentRequest::Magnet { uri, paused, .. } => {
                let link = parse_magnet(uri)?;
                let prefix: String = link.info_hash.chars().take(8).collect();
                let name = link
                    .display_name
                    .unwrap_or_else(|| format!("Mock Torrent {}", prefix));
                Ok(MockHandle::new(MockHandleInit {
                    name,
                    info_hash: link.info_hash,
                    save_path,
                    paused: *paused,
                    total_wanted: MAGNET_SIZE,
                    files: Vec::new(),
                    trackers: link.trackers,
                    descriptor: None,
                }))
            }
            AddTorrentRequest::Descriptor { data, paused, .. } => {
                let descriptor = parse_descriptor(data)?;
                let files = descriptor
                    .files
                    .iter()
                    .enumerate()
                    .map(|(index, f)| FileEntry {
                        index,
                        path: f.path.clone(),
                        size_bytes: f.size_bytes,
                        priority: DEFAULT_PRIORITY,
                    })
                    .collect();
                Ok(MockHandle::new(MockHandleInit {
                    total_wanted: descriptor.total_size(),
                    name: descriptor.name,
                    info_hash: descriptor.info_hash,
                    save_path,
                    paused: *paused,
                    files,
                    trackers: Vec::new(),
                    descriptor: Some(data.clone()),
                }))
            }
        }
    }
}

#[async_trait]
impl TorrentEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add(&self, request: AddTorrentRequest) -> Result<Arc<dyn TorrentHandle>, EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.added.write().await.push(RecordedAdd {
            request: request.clone(),
            timestamp: Utc::now(),
        });

        let handle = self.build_handle(&request)?;

        let handle = {
            let mut handles = self.handles.write().await;
            match handles.get(&handle.info_hash) {
                Some(existing) => existing.clone(),
                None => {
                    let handle = Arc::new(handle);
                    handles.insert(handle.info_hash.clone(), handle.clone());
                    handle
                }
            }
        };

        let delay = *self.add_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(handle)
    }

    async fn remove(&self, handle: &dyn TorrentHandle, delete_data: bool) -> Result<(), EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let hash = handle.info_hash();
        if self.handles.write().await.remove(&hash).is_none() {
            return Err(EngineError::TorrentNotFound(hash));
        }
        self.removed.write().await.push(RecordedRemove {
            info_hash: hash,
            delete_data,
        });
        Ok(())
    }
}

struct MockHandleInit {
    name: String,
    info_hash: String,
    save_path: String,
    paused: bool,
    total_wanted: u64,
    files: Vec<FileEntry>,
    trackers: Vec<String>,
    descriptor: Option<Vec<u8>>,
}

/// Internal state for a mock torrent.
#[derive(Debug, Clone)]
pub struct MockHandleState {
    pub status: TorrentStatus,
    pub paused: bool,
    pub priority: u8,
    pub files: Vec<FileEntry>,
    pub sequential: bool,
    pub super_seeding: bool,
    pub trackers: Vec<String>,
    pub peers: Vec<PeerInfo>,
    pub pieces: Vec<u32>,
    pub download_limit: u64,
    pub upload_limit: u64,
    pub rechecks: u32,
    pub failing: bool,
    pub details_unsupported: bool,
    descriptor: Option<Vec<u8>>,
}

/// Handle returned by [`MockEngine`].
#[derive(Debug)]
pub struct MockHandle {
    name: String,
    info_hash: String,
    state: RwLock<MockHandleState>,
}

impl MockHandle {
    fn new(init: MockHandleInit) -> Self {
        let status = TorrentStatus {
            progress: 0.0,
            download_rate: 0,
            upload_rate: 0,
            num_peers: 0,
            num_seeds: 0,
            total_done: 0,
            total_wanted: init.total_wanted,
            total_upload: 0,
            total_download: 0,
            state: if init.paused {
                TorrentState::Paused
            } else {
                TorrentState::Downloading
            },
            save_path: init.save_path,
            info_hash: Some(init.info_hash.clone()),
        };
        Self {
            name: init.name,
            info_hash: init.info_hash,
            state: RwLock::new(MockHandleState {
                status,
                paused: init.paused,
                priority: DEFAULT_PRIORITY,
                files: init.files,
                sequential: false,
                super_seeding: false,
                trackers: init.trackers,
                peers: Vec::new(),
                pieces: Vec::new(),
                download_limit: 0,
                upload_limit: 0,
                rechecks: 0,
                failing: false,
                details_unsupported: false,
                descriptor: init.descriptor,
            }),
        }
    }

    /// Snapshot of the internal state.
    pub async fn snapshot(&self) -> MockHandleState {
        self.state.read().await.clone()
    }

    async fn set_progress(&self, progress: f64) {
        let mut state = self.state.write().await;
        let progress = progress.clamp(0.0, 1.0);
        state.status.progress = progress;
        state.status.total_done = (state.status.total_wanted as f64 * progress) as u64;
        if !state.paused {
            state.status.state = if progress >= 1.0 {
                TorrentState::Seeding
            } else {
                TorrentState::Downloading
            };
        }
    }

    async fn write(&self) -> Result<tokio::sync::RwLockWriteGuard<'_, MockHandleState>, EngineError> {
        let state = self.state.write().await;
        if state.failing {
            return Err(EngineError::Internal(format!(
                "mock handle {} is failing",
                self.info_hash
            )));
        }
        Ok(state)
    }

    async fn details(
        &self,
        operation: &'static str,
    ) -> Result<tokio::sync::RwLockWriteGuard<'_, MockHandleState>, EngineError> {
        let state = self.write().await?;
        if state.details_unsupported {
            return Err(EngineError::unsupported("mock", operation));
        }
        Ok(state)
    }
}

#[async_trait]
impl TorrentHandle for MockHandle {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn info_hash(&self) -> String {
        self.info_hash.clone()
    }

    async fn status(&self) -> Result<TorrentStatus, EngineError> {
        Ok(self.write().await?.status.clone())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        let mut state = self.write().await?;
        state.paused = true;
        state.status.state = TorrentState::Paused;
        state.status.download_rate = 0;
        state.status.upload_rate = 0;
        Ok(())
    }

    async fn resume(&self) -> Result<(), EngineError> {
        let mut state = self.write().await?;
        state.paused = false;
        state.status.state = if state.status.progress >= 1.0 {
            TorrentState::Seeding
        } else {
            TorrentState::Downloading
        };
        Ok(())
    }

    async fn priority(&self) -> Result<u8, EngineError> {
        Ok(self.details("torrent priority").await?.priority)
    }

    async fn set_priority(&self, priority: u8) -> Result<(), EngineError> {
        self.write().await?.priority = priority;
        Ok(())
    }

    async fn files(&self) -> Result<Vec<FileEntry>, EngineError> {
        Ok(self.details("file listing").await?.files.clone())
    }

    async fn set_file_priority(&self, index: usize, priority: u8) -> Result<(), EngineError> {
        let mut state = self.write().await?;
        let file = state
            .files
            .get_mut(index)
            .ok_or_else(|| EngineError::Internal(format!("file index {} out of range", index)))?;
        file.priority = priority;
        Ok(())
    }

    async fn set_sequential(&self, enabled: bool) -> Result<(), EngineError> {
        self.write().await?.sequential = enabled;
        Ok(())
    }

    async fn set_super_seeding(&self, enabled: bool) -> Result<(), EngineError> {
        self.write().await?.super_seeding = enabled;
        Ok(())
    }

    async fn force_recheck(&self) -> Result<(), EngineError> {
        let mut state = self.write().await?;
        state.rechecks += 1;
        state.status.state = TorrentState::Checking;
        Ok(())
    }

    async fn trackers(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.details("tracker listing").await?.trackers.clone())
    }

    async fn add_tracker(&self, url: &str) -> Result<(), EngineError> {
        let mut state = self.write().await?;
        if !state.trackers.iter().any(|t| t == url) {
            state.trackers.push(url.to_string());
        }
        Ok(())
    }

    async fn replace_trackers(&self, urls: Vec<String>) -> Result<(), EngineError> {
        self.write().await?.trackers = urls;
        Ok(())
    }

    async fn move_storage(&self, path: &Path) -> Result<(), EngineError> {
        self.write().await?.status.save_path = PathBuf::from(path).display().to_string();
        Ok(())
    }

    async fn set_download_limit(&self, bytes_per_sec: u64) -> Result<(), EngineError> {
        self.write().await?.download_limit = bytes_per_sec;
        Ok(())
    }

    async fn set_upload_limit(&self, bytes_per_sec: u64) -> Result<(), EngineError> {
        self.write().await?.upload_limit = bytes_per_sec;
        Ok(())
    }

    async fn peer_info(&self) -> Result<Vec<PeerInfo>, EngineError> {
        Ok(self.details("peer listing").await?.peers.clone())
    }

    async fn piece_availability(&self) -> Result<Vec<u32>, EngineError> {
        Ok(self.write().await?.pieces.clone())
    }

    async fn export_descriptor(&self) -> Result<Vec<u8>, EngineError> {
        self.write()
            .await?
            .descriptor
            .clone()
            .ok_or_else(|| EngineError::InvalidTorrent("metadata not yet available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_add_magnet_and_progress() {
        let engine = MockEngine::new();
        let handle = engine
            .add(AddTorrentRequest::magnet(fixtures::magnet("abc123", "Demo")))
            .await
            .unwrap();

        assert_eq!(handle.name(), "Demo");
        assert_eq!(handle.info_hash(), "abc123");
        assert!(engine.has_torrent("abc123").await);

        engine.set_progress("abc123", 1.0).await;
        let status = handle.status().await.unwrap();
        assert!(status.is_complete());
        assert_eq!(status.state, TorrentState::Seeding);
    }

    #[tokio::test]
    async fn test_add_descriptor_lists_files() {
        let engine = MockEngine::with_save_path("/srv");
        let data = fixtures::single_file_descriptor("disk.img", 2048);
        let handle = engine.add(AddTorrentRequest::descriptor(data.clone())).await.unwrap();

        let files = handle.files().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size_bytes, 2048);
        assert_eq!(handle.status().await.unwrap().save_path, "/srv");
        assert_eq!(handle.export_descriptor().await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_paused_add_and_resume() {
        let engine = MockEngine::new();
        let handle = engine
            .add(AddTorrentRequest::magnet(fixtures::magnet("p1", "P")).with_paused(true))
            .await
            .unwrap();
        assert_eq!(handle.status().await.unwrap().state, TorrentState::Paused);

        handle.resume().await.unwrap();
        assert_eq!(handle.status().await.unwrap().state, TorrentState::Downloading);
    }

    #[tokio::test]
    async fn test_next_error_and_failing_handle() {
        let engine = MockEngine::new();
        engine.set_next_error(EngineError::Timeout).await;
        assert!(matches!(
            engine.add(AddTorrentRequest::magnet(fixtures::magnet("x", "X"))).await,
            Err(EngineError::Timeout)
        ));

        let handle = engine
            .add(AddTorrentRequest::magnet(fixtures::magnet("x", "X")))
            .await
            .unwrap();
        engine.set_failing("x", true).await;
        assert!(handle.status().await.is_err());
        assert!(handle.pause().await.is_err());
    }

    #[tokio::test]
    async fn test_details_unsupported_keeps_status() {
        let engine = MockEngine::new();
        let handle = engine
            .add(AddTorrentRequest::magnet(fixtures::magnet("d1", "D")))
            .await
            .unwrap();
        engine.set_details_unsupported("d1", true).await;

        assert!(matches!(
            handle.priority().await,
            Err(EngineError::Unsupported { .. })
        ));
        assert!(handle.files().await.is_err());
        assert!(handle.status().await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_records_call() {
        let engine = MockEngine::new();
        let handle = engine
            .add(AddTorrentRequest::magnet(fixtures::magnet("r1", "R")))
            .await
            .unwrap();

        engine.remove(handle.as_ref(), true).await.unwrap();
        assert_eq!(engine.torrent_count().await, 0);
        assert_eq!(
            engine.removed().await,
            vec![RecordedRemove {
                info_hash: "r1".to_string(),
                delete_data: true
            }]
        );
        assert!(matches!(
            engine.remove(handle.as_ref(), false).await,
            Err(EngineError::TorrentNotFound(_))
        ));
    }
}
