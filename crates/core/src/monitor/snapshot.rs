use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::engine::{PeerInfo, TorrentState};
use crate::registry::{SessionStats, TorrentId, TorrentRegistry};

/// What a monitor frame includes beyond the torrent table.
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// Piece availability of the first torrent.
    pub show_pieces: bool,
    /// Connected peers of the first torrent.
    pub show_peers: bool,
    pub max_peers: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            show_pieces: false,
            show_peers: false,
            max_peers: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorRow {
    pub id: TorrentId,
    pub name: String,
    pub progress: f64,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub num_peers: u32,
    pub state: TorrentState,
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerSection {
    /// At most `max_peers` entries.
    pub peers: Vec<PeerInfo>,
    /// Peers connected in total.
    pub total: usize,
}

/// One frame of the live monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub captured_at: DateTime<Utc>,
    pub rows: Vec<MonitorRow>,
    pub session: SessionStats,
    pub pieces: Option<Vec<u32>>,
    pub peers: Option<PeerSection>,
}

impl MonitorSnapshot {
    /// Read every torrent once. Torrents that fail to report are left out
    /// of this frame.
    pub async fn capture(registry: &TorrentRegistry, options: MonitorOptions) -> Self {
        let mut rows = Vec::new();
        for record in registry.records().await {
            let handle = &record.handle;
            let status = match handle.status().await {
                Ok(status) => status,
                Err(e) => {
                    debug!(torrent_id = record.id, error = %e, "Torrent missing from monitor frame");
                    continue;
                }
            };
            let priority = handle.priority().await.unwrap_or_default();
            rows.push(MonitorRow {
                id: record.id,
                name: handle.name(),
                progress: status.progress,
                download_rate: status.download_rate,
                upload_rate: status.upload_rate,
                num_peers: status.num_peers,
                state: status.state,
                priority,
            });
        }

        let first = rows.first().map(|r| r.id);
        let pieces = match (options.show_pieces, first) {
            (true, Some(id)) => registry.pieces(id).await.ok().filter(|p| !p.is_empty()),
            _ => None,
        };
        let peers = match (options.show_peers, first) {
            (true, Some(id)) => registry.peers(id).await.ok().map(|mut peers| {
                let total = peers.len();
                peers.truncate(options.max_peers);
                PeerSection { peers, total }
            }),
            _ => None,
        };

        Self {
            captured_at: Utc::now(),
            rows,
            session: registry.session_stats().await,
            pieces,
            peers,
        }
    }
}
