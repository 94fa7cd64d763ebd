//! librqbit embedded engine backend.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use librqbit::{
    AddTorrent as RqbitAddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session,
    SessionOptions, SessionPersistenceConfig,
};
use tracing::{debug, info, warn};

use super::{
    AddTorrentRequest, EngineError, FileEntry, PeerInfo, TorrentEngine, TorrentHandle,
    TorrentState, TorrentStatus, DEFAULT_PRIORITY,
};
use crate::config::EngineConfig;

const BACKEND: &str = "librqbit";

/// Magnet resolution over DHT can stall indefinitely for rare torrents.
const ADD_TIMEOUT: Duration = Duration::from_secs(60);

/// Embedded librqbit session.
pub struct LibrqbitEngine {
    session: Arc<Session>,
    download_path: PathBuf,
}

impl LibrqbitEngine {
    /// Create a new session from configuration.
    pub async fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let download_path = config.resolved_download_path();

        if !download_path.exists() {
            std::fs::create_dir_all(&download_path).map_err(|e| {
                EngineError::Session(format!("Failed to create download directory: {}", e))
            })?;
        }

        let mut opts = SessionOptions::default();

        if !config.enable_dht {
            opts.disable_dht = true;
        }

        if let Some(port) = config.listen_port {
            opts.listen_port_range = Some(port..(port + 1));
        }

        if let Some(ref persistence_path) = config.persistence_path {
            if !persistence_path.exists() {
                std::fs::create_dir_all(persistence_path).map_err(|e| {
                    EngineError::Session(format!(
                        "Failed to create persistence directory: {}",
                        e
                    ))
                })?;
            }
            opts.persistence = Some(SessionPersistenceConfig::Json {
                folder: Some(persistence_path.clone()),
            });
        }

        if config.max_upload_kbps > 0 || config.max_download_kbps > 0 {
            warn!(
                max_upload_kbps = config.max_upload_kbps,
                max_download_kbps = config.max_download_kbps,
                "Session rate limits are not applied by the librqbit backend"
            );
        }

        info!(
            download_path = %download_path.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(download_path.clone(), opts)
            .await
            .map_err(|e| {
                EngineError::Session(format!("Failed to initialize librqbit session: {}", e))
            })?;

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
        }

        Ok(Self {
            session,
            download_path,
        })
    }

    fn find_torrent(&self, hash: &str) -> Option<Arc<ManagedTorrent>> {
        let hash_lower = hash.to_lowercase();

        self.session.with_torrents(|iter| {
            for (_, torrent) in iter {
                if torrent.info_hash().as_string() == hash_lower {
                    return Some(torrent.clone());
                }
            }
            None
        })
    }

    fn wrap(&self, torrent: Arc<ManagedTorrent>) -> Arc<dyn TorrentHandle> {
        Arc::new(LibrqbitHandle {
            session: Arc::clone(&self.session),
            torrent,
            save_path: self.download_path.clone(),
        })
    }
}

#[async_trait]
impl TorrentEngine for LibrqbitEngine {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn add(&self, request: AddTorrentRequest) -> Result<Arc<dyn TorrentHandle>, EngineError> {
        if let Some(path) = request.save_path() {
            if path != self.download_path {
                debug!(
                    requested = %path.display(),
                    session = %self.download_path.display(),
                    "librqbit uses the session download path"
                );
            }
        }

        let (add_torrent, paused) = match request {
            AddTorrentRequest::Magnet { uri, paused, .. } => {
                (RqbitAddTorrent::from_url(uri), paused)
            }
            AddTorrentRequest::Descriptor { data, paused, .. } => {
                (RqbitAddTorrent::from_bytes(data), paused)
            }
        };

        let opts = if paused {
            Some(AddTorrentOptions {
                paused: true,
                ..Default::default()
            })
        } else {
            None
        };

        let response = tokio::time::timeout(ADD_TIMEOUT, self.session.add_torrent(add_torrent, opts))
            .await
            .map_err(|_| EngineError::Timeout)?
            .map_err(|e| EngineError::Session(format!("Failed to add torrent: {}", e)))?;

        match response {
            AddTorrentResponse::Added(_, torrent) => {
                debug!(hash = %torrent.info_hash().as_string(), "Torrent added");
                Ok(self.wrap(torrent))
            }
            AddTorrentResponse::AlreadyManaged(_, torrent) => {
                warn!(hash = %torrent.info_hash().as_string(), "Torrent already managed");
                Ok(self.wrap(torrent))
            }
            AddTorrentResponse::ListOnly(_) => Err(EngineError::Internal(
                "Torrent was added in list-only mode".to_string(),
            )),
        }
    }

    async fn remove(
        &self,
        handle: &dyn TorrentHandle,
        delete_data: bool,
    ) -> Result<(), EngineError> {
        let hash = handle.info_hash();
        let torrent = self
            .find_torrent(&hash)
            .ok_or_else(|| EngineError::TorrentNotFound(hash.clone()))?;

        self.session
            .delete(torrent.id().into(), delete_data)
            .await
            .map_err(|e| EngineError::Session(format!("Failed to remove torrent: {}", e)))?;

        debug!(hash = %hash, delete_data, "Torrent removed");
        Ok(())
    }
}

/// Handle to a torrent managed by a librqbit session.
pub struct LibrqbitHandle {
    session: Arc<Session>,
    torrent: Arc<ManagedTorrent>,
    save_path: PathBuf,
}

impl LibrqbitHandle {
    fn map_state(
        state: &librqbit::TorrentStatsState,
        is_paused: bool,
        is_finished: bool,
    ) -> TorrentState {
        use librqbit::TorrentStatsState;

        if is_paused {
            return TorrentState::Paused;
        }

        match state {
            TorrentStatsState::Initializing => TorrentState::Checking,
            TorrentStatsState::Live => {
                if is_finished {
                    TorrentState::Seeding
                } else {
                    TorrentState::Downloading
                }
            }
            TorrentStatsState::Paused => TorrentState::Paused,
            TorrentStatsState::Error => TorrentState::Error,
        }
    }

    fn metadata_error<E: std::fmt::Display>(e: E) -> EngineError {
        EngineError::InvalidTorrent(format!("metadata not yet available: {}", e))
    }
}

#[async_trait]
impl TorrentHandle for LibrqbitHandle {
    fn name(&self) -> String {
        let hash = self.info_hash();
        self.torrent
            .name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("torrent-{}", &hash[..8.min(hash.len())]))
    }

    fn info_hash(&self) -> String {
        self.torrent.info_hash().as_string()
    }

    async fn status(&self) -> Result<TorrentStatus, EngineError> {
        let stats = self.torrent.stats();
        let state = Self::map_state(&stats.state, self.torrent.is_paused(), stats.finished);

        let progress = if stats.total_bytes > 0 {
            stats.progress_bytes as f64 / stats.total_bytes as f64
        } else {
            0.0
        };

        let (download_rate, upload_rate, num_seeds, num_peers) = stats
            .live
            .as_ref()
            .map(|live| {
                // librqbit reports MiB/s in its `mbps` fields.
                let dl = (live.download_speed.mbps * 1024.0 * 1024.0) as u64;
                let ul = (live.upload_speed.mbps * 1024.0 * 1024.0) as u64;
                let total_peers = live.snapshot.peer_stats.queued
                    + live.snapshot.peer_stats.connecting
                    + live.snapshot.peer_stats.live;
                (
                    dl,
                    ul,
                    live.snapshot.peer_stats.live as u32,
                    total_peers as u32,
                )
            })
            .unwrap_or((0, 0, 0, 0));

        Ok(TorrentStatus {
            progress,
            download_rate,
            upload_rate,
            num_peers,
            num_seeds,
            total_done: stats.progress_bytes,
            total_wanted: stats.total_bytes,
            total_upload: stats.uploaded_bytes,
            total_download: stats.progress_bytes,
            state,
            save_path: self.save_path.display().to_string(),
            info_hash: Some(self.info_hash()),
        })
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.session
            .pause(&self.torrent)
            .await
            .map_err(|e| EngineError::Session(format!("Failed to pause torrent: {}", e)))
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.session
            .unpause(&self.torrent)
            .await
            .map_err(|e| EngineError::Session(format!("Failed to resume torrent: {}", e)))
    }

    async fn priority(&self) -> Result<u8, EngineError> {
        Err(EngineError::unsupported(BACKEND, "torrent priority"))
    }

    async fn set_priority(&self, _priority: u8) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "torrent priority"))
    }

    /// Files deselected through librqbit's `only_files` report priority 0.
    async fn files(&self) -> Result<Vec<FileEntry>, EngineError> {
        let only_files = self.torrent.only_files();
        self.torrent
            .with_metadata(|meta| {
                meta.file_infos
                    .iter()
                    .enumerate()
                    .map(|(index, file)| FileEntry {
                        index,
                        path: file.relative_filename.display().to_string(),
                        size_bytes: file.len,
                        priority: match &only_files {
                            Some(selected) if !selected.contains(&index) => 0,
                            _ => DEFAULT_PRIORITY,
                        },
                    })
                    .collect::<Vec<_>>()
            })
            .map_err(Self::metadata_error)
    }

    async fn set_file_priority(&self, _index: usize, _priority: u8) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "file priority"))
    }

    async fn set_sequential(&self, _enabled: bool) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "sequential download"))
    }

    async fn set_super_seeding(&self, _enabled: bool) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "super seeding"))
    }

    async fn force_recheck(&self) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "force recheck"))
    }

    async fn trackers(&self) -> Result<Vec<String>, EngineError> {
        Err(EngineError::unsupported(BACKEND, "tracker listing"))
    }

    async fn add_tracker(&self, _url: &str) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "tracker editing"))
    }

    async fn replace_trackers(&self, _urls: Vec<String>) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "tracker editing"))
    }

    async fn move_storage(&self, _path: &Path) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "storage move"))
    }

    async fn set_download_limit(&self, _bytes_per_sec: u64) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "per-torrent download limit"))
    }

    async fn set_upload_limit(&self, _bytes_per_sec: u64) -> Result<(), EngineError> {
        Err(EngineError::unsupported(BACKEND, "per-torrent upload limit"))
    }

    async fn peer_info(&self) -> Result<Vec<PeerInfo>, EngineError> {
        let Some(live) = self.torrent.live() else {
            return Ok(Vec::new());
        };

        let mut peers: Vec<PeerInfo> = live
            .per_peer_stats_snapshot(Default::default())
            .peers
            .into_iter()
            .filter_map(|(addr, stats)| {
                let addr: SocketAddr = addr.parse().ok()?;
                let counters = &stats.counters;
                // librqbit keeps per-peer counters only; this is the average
                // rate over the time spent downloading pieces.
                let download_rate = if counters.total_piece_download_ms > 0 {
                    counters.fetched_bytes * 1000 / counters.total_piece_download_ms
                } else {
                    0
                };
                Some(PeerInfo {
                    ip: addr.ip().to_string(),
                    port: addr.port(),
                    client: stats.state.to_string(),
                    progress: 0.0,
                    download_rate,
                    upload_rate: 0,
                    flags: 0,
                })
            })
            .collect();
        peers.sort_by(|a, b| (a.ip.as_str(), a.port).cmp(&(b.ip.as_str(), b.port)));
        Ok(peers)
    }

    async fn piece_availability(&self) -> Result<Vec<u32>, EngineError> {
        Err(EngineError::unsupported(BACKEND, "piece availability"))
    }

    async fn export_descriptor(&self) -> Result<Vec<u8>, EngineError> {
        let bytes = self
            .torrent
            .with_metadata(|meta| meta.torrent_bytes.to_vec())
            .map_err(Self::metadata_error)?;
        if bytes.is_empty() {
            return Err(EngineError::InvalidTorrent(
                "descriptor bytes not kept by the session".to_string(),
            ));
        }
        Ok(bytes)
    }
}
