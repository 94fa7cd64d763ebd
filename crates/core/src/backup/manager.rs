use chrono::{Local, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{
    BackupError, BackupFile, BackupSnapshot, BackupTorrent, RestoreEntry, RestoreReport,
};
use crate::engine::{EngineError, DEFAULT_PRIORITY};
use crate::registry::{TorrentRecord, TorrentRegistry};

const EXTENSION: &str = "json";

/// Writes and reads backup snapshots in one directory.
pub struct BackupManager {
    registry: Arc<TorrentRegistry>,
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(registry: Arc<TorrentRegistry>, dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot every registered torrent to `<dir>/<name>.json`.
    ///
    /// Without a name, `backup_%Y%m%d_%H%M%S` is used. Only torrents whose
    /// status cannot be read are left out; a missing priority or file list
    /// falls back to the default priority and no files.
    pub async fn create_backup(&self, name: Option<&str>) -> Result<PathBuf, BackupError> {
        let name = match name {
            Some(name) => validate_name(name)?.to_string(),
            None => Local::now().format("backup_%Y%m%d_%H%M%S").to_string(),
        };

        let mut torrents = Vec::new();
        for record in self.registry.records().await {
            match describe(&record).await {
                Ok(torrent) => torrents.push(torrent),
                Err(e) => {
                    warn!(torrent_id = record.id, error = %e, "Leaving torrent out of backup");
                }
            }
        }

        let snapshot = BackupSnapshot {
            timestamp: Utc::now(),
            torrents,
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{name}.{EXTENSION}"));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?).await?;

        info!(
            path = %path.display(),
            torrents = snapshot.torrents.len(),
            "Backup created"
        );
        Ok(path)
    }

    /// Report what a backup contains. The registry is never modified.
    ///
    /// `backup` is a path, a file name inside the backup directory, or a
    /// backup name without extension.
    pub async fn restore_backup(&self, backup: &str) -> Result<RestoreReport, BackupError> {
        let path = self.resolve(backup).await?;
        let content = tokio::fs::read(&path).await?;
        let snapshot: BackupSnapshot = serde_json::from_slice(&content)
            .map_err(|e| BackupError::InvalidFormat(format!("{}: {e}", path.display())))?;

        let registered: HashSet<String> = self
            .registry
            .get_all()
            .await
            .values()
            .map(|h| h.info_hash())
            .collect();

        let entries = snapshot
            .torrents
            .into_iter()
            .map(|torrent| RestoreEntry {
                currently_registered: registered.contains(&torrent.info_hash),
                torrent,
            })
            .collect();

        Ok(RestoreReport {
            timestamp: snapshot.timestamp,
            entries,
        })
    }

    /// Backup file names, sorted. A missing directory has no backups.
    pub async fn list_backups(&self) -> Result<Vec<String>, BackupError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn resolve(&self, backup: &str) -> Result<PathBuf, BackupError> {
        let mut candidates = vec![PathBuf::from(backup), self.dir.join(backup)];
        if Path::new(backup).extension().is_none() {
            candidates.push(self.dir.join(format!("{backup}.{EXTENSION}")));
        }
        for candidate in candidates {
            if tokio::fs::metadata(&candidate)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                return Ok(candidate);
            }
        }
        Err(BackupError::NotFound(backup.to_string()))
    }
}

async fn describe(record: &TorrentRecord) -> Result<BackupTorrent, EngineError> {
    let handle = &record.handle;
    let status = handle.status().await?;

    let priority = handle.priority().await.unwrap_or_else(|e| {
        debug!(torrent_id = record.id, error = %e, "Backing up default priority");
        DEFAULT_PRIORITY
    });
    let files = match handle.files().await {
        Ok(files) => files
            .into_iter()
            .map(|f| BackupFile {
                path: f.path,
                size: f.size_bytes,
                priority: f.priority,
            })
            .collect(),
        Err(e) => {
            debug!(torrent_id = record.id, error = %e, "Backing up without file list");
            Vec::new()
        }
    };

    Ok(BackupTorrent {
        torrent_id: record.id,
        name: handle.name(),
        save_path: status.save_path,
        priority,
        info_hash: handle.info_hash(),
        files,
    })
}

fn validate_name(name: &str) -> Result<&str, BackupError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed.starts_with('.') {
        return Err(BackupError::InvalidName(name.to_string()));
    }
    Ok(trimmed.strip_suffix(".json").unwrap_or(trimmed))
}
