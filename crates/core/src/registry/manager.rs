use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::types::{
    AddOptions, RegistryError, SessionStats, TorrentId, TorrentListing, TorrentRecord,
};
use crate::engine::{
    parse_descriptor, parse_magnet, AddTorrentRequest, EngineError, FileEntry, PeerInfo,
    TorrentEngine, TorrentHandle, TorrentState, TorrentStatus, MAX_PRIORITY,
};

struct RegistryInner {
    next_id: TorrentId,
    records: BTreeMap<TorrentId, TorrentRecord>,
}

/// Owns the mapping from torrent ids to engine handles.
///
/// Every mutation and every snapshot read goes through one lock, so callers
/// never see an id without a handle or a handle under two ids.
pub struct TorrentRegistry {
    engine: Arc<dyn TorrentEngine>,
    save_path: PathBuf,
    auto_start: bool,
    inner: RwLock<RegistryInner>,
    /// Held across engine add/remove and the matching record change, so the
    /// engine and the id map never disagree about a torrent.
    mutation: Mutex<()>,
}

impl TorrentRegistry {
    pub fn new(
        engine: Arc<dyn TorrentEngine>,
        save_path: impl Into<PathBuf>,
        auto_start: bool,
    ) -> Self {
        Self {
            engine,
            save_path: save_path.into(),
            auto_start,
            inner: RwLock::new(RegistryInner {
                next_id: 1,
                records: BTreeMap::new(),
            }),
            mutation: Mutex::new(()),
        }
    }

    /// Name of the backing engine.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Add a magnet URI or a local descriptor path with default options.
    pub async fn add(&self, source: &str) -> Result<TorrentId, RegistryError> {
        self.add_with(source, AddOptions::default()).await
    }

    /// Add a magnet URI or a local descriptor path.
    pub async fn add_with(
        &self,
        source: &str,
        options: AddOptions,
    ) -> Result<TorrentId, RegistryError> {
        check_priority(options.priority)?;

        if source.starts_with("magnet:") {
            parse_magnet(source).map_err(|e| RegistryError::InvalidFormat(e.to_string()))?;
            let request = AddTorrentRequest::magnet(source).with_save_path(&self.save_path);
            return self.register(request, options).await;
        }

        let path = Path::new(source);
        let data = read_descriptor_file(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string());
        self.add_descriptor(data, Some(filename), options).await
    }

    /// Add a torrent from descriptor bytes already in memory.
    pub async fn add_descriptor(
        &self,
        data: Vec<u8>,
        filename: Option<String>,
        options: AddOptions,
    ) -> Result<TorrentId, RegistryError> {
        check_priority(options.priority)?;
        parse_descriptor(&data).map_err(|e| RegistryError::InvalidFormat(e.to_string()))?;

        let mut request = AddTorrentRequest::descriptor(data).with_save_path(&self.save_path);
        if let Some(filename) = filename {
            request = request.with_filename(filename);
        }
        self.register(request, options).await
    }

    async fn register(
        &self,
        request: AddTorrentRequest,
        options: AddOptions,
    ) -> Result<TorrentId, RegistryError> {
        let mutation = self.mutation.lock().await;
        let handle = self.engine.add(request).await.map_err(|e| match e {
            EngineError::InvalidTorrent(msg) => RegistryError::InvalidFormat(msg),
            other => RegistryError::Engine(other),
        })?;
        let info_hash = handle.info_hash();

        let id = {
            let mut inner = self.inner.write().await;
            if let Some(existing) = inner
                .records
                .values()
                .find(|r| r.handle.info_hash() == info_hash)
            {
                return Err(RegistryError::Duplicate(existing.id));
            }

            let id = inner.next_id;
            inner.next_id += 1;
            inner.records.insert(
                id,
                TorrentRecord {
                    id,
                    handle: handle.clone(),
                    created_at: Utc::now(),
                },
            );
            id
        };
        drop(mutation);

        info!(torrent_id = id, name = %handle.name(), info_hash = %info_hash, "Torrent added");

        if let Err(e) = handle.set_priority(options.priority).await {
            warn!(torrent_id = id, error = %e, "Failed to apply initial priority");
        }
        if options.sequential {
            if let Err(e) = handle.set_sequential(true).await {
                warn!(torrent_id = id, error = %e, "Failed to enable sequential download");
            }
        }
        if self.auto_start {
            if let Err(e) = handle.resume().await {
                warn!(torrent_id = id, error = %e, "Failed to auto-start torrent");
            }
        }

        Ok(id)
    }

    /// Detach a torrent from the engine and forget it.
    pub async fn remove(&self, id: TorrentId, delete_data: bool) -> Result<(), RegistryError> {
        let _mutation = self.mutation.lock().await;
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get(&id)
            .ok_or(RegistryError::TorrentNotFound(id))?;

        self.engine.remove(record.handle.as_ref(), delete_data).await?;
        inner.records.remove(&id);

        info!(torrent_id = id, delete_data, "Torrent removed");
        Ok(())
    }

    /// Handle for an id.
    pub async fn get(&self, id: TorrentId) -> Result<Arc<dyn TorrentHandle>, RegistryError> {
        Ok(self.record(id).await?.handle)
    }

    pub async fn record(&self, id: TorrentId) -> Result<TorrentRecord, RegistryError> {
        self.inner
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or(RegistryError::TorrentNotFound(id))
    }

    /// Snapshot of every id and handle, ordered by id.
    pub async fn get_all(&self) -> BTreeMap<TorrentId, Arc<dyn TorrentHandle>> {
        self.inner
            .read()
            .await
            .records
            .iter()
            .map(|(id, r)| (*id, r.handle.clone()))
            .collect()
    }

    /// Snapshot of every record, ordered by id.
    pub async fn records(&self) -> Vec<TorrentRecord> {
        self.inner.read().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// Torrents whose name contains `query`, ignoring case.
    pub async fn search(&self, query: &str) -> BTreeMap<TorrentId, Arc<dyn TorrentHandle>> {
        let query = query.to_lowercase();
        self.get_all()
            .await
            .into_iter()
            .filter(|(_, handle)| handle.name().to_lowercase().contains(&query))
            .collect()
    }

    /// Every torrent with its status, optionally limited to one state.
    ///
    /// Torrents whose status cannot be read are skipped.
    pub async fn list(&self, state: Option<TorrentState>) -> Vec<TorrentListing> {
        let mut listings = Vec::new();
        for (id, handle) in self.get_all().await {
            let status = match handle.status().await {
                Ok(status) => status,
                Err(e) => {
                    warn!(torrent_id = id, error = %e, "Failed to read torrent status");
                    continue;
                }
            };
            if state.is_some_and(|s| s != status.state) {
                continue;
            }
            listings.push(TorrentListing {
                id,
                name: handle.name(),
                info_hash: handle.info_hash(),
                status,
            });
        }
        listings
    }

    pub async fn status(&self, id: TorrentId) -> Result<TorrentStatus, RegistryError> {
        Ok(self.get(id).await?.status().await?)
    }

    pub async fn pause(&self, id: TorrentId) -> Result<(), RegistryError> {
        self.get(id).await?.pause().await?;
        debug!(torrent_id = id, "Torrent paused");
        Ok(())
    }

    pub async fn resume(&self, id: TorrentId) -> Result<(), RegistryError> {
        self.get(id).await?.resume().await?;
        debug!(torrent_id = id, "Torrent resumed");
        Ok(())
    }

    /// Set torrent priority (0-7).
    pub async fn set_priority(&self, id: TorrentId, priority: u8) -> Result<(), RegistryError> {
        let handle = self.get(id).await?;
        check_priority(priority)?;
        handle.set_priority(priority).await?;
        Ok(())
    }

    pub async fn priority(&self, id: TorrentId) -> Result<u8, RegistryError> {
        Ok(self.get(id).await?.priority().await?)
    }

    pub async fn files(&self, id: TorrentId) -> Result<Vec<FileEntry>, RegistryError> {
        Ok(self.get(id).await?.files().await?)
    }

    /// Set the priority (0-7) of one file within a torrent.
    pub async fn set_file_priority(
        &self,
        id: TorrentId,
        index: usize,
        priority: u8,
    ) -> Result<(), RegistryError> {
        let handle = self.get(id).await?;
        check_priority(priority)?;
        handle.set_file_priority(index, priority).await?;
        Ok(())
    }

    pub async fn trackers(&self, id: TorrentId) -> Result<Vec<String>, RegistryError> {
        Ok(self.get(id).await?.trackers().await?)
    }

    pub async fn add_trackers(&self, id: TorrentId, urls: &[String]) -> Result<(), RegistryError> {
        let handle = self.get(id).await?;
        for url in urls {
            handle.add_tracker(url).await?;
        }
        Ok(())
    }

    /// Drop the given tracker URLs, keeping the rest in order.
    pub async fn remove_trackers(
        &self,
        id: TorrentId,
        urls: &[String],
    ) -> Result<(), RegistryError> {
        let handle = self.get(id).await?;
        let remaining: Vec<String> = handle
            .trackers()
            .await?
            .into_iter()
            .filter(|t| !urls.contains(t))
            .collect();
        handle.replace_trackers(remaining).await?;
        Ok(())
    }

    pub async fn force_recheck(&self, id: TorrentId) -> Result<(), RegistryError> {
        Ok(self.get(id).await?.force_recheck().await?)
    }

    pub async fn set_sequential(&self, id: TorrentId, enabled: bool) -> Result<(), RegistryError> {
        Ok(self.get(id).await?.set_sequential(enabled).await?)
    }

    pub async fn set_super_seeding(
        &self,
        id: TorrentId,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        Ok(self.get(id).await?.set_super_seeding(enabled).await?)
    }

    pub async fn move_storage(&self, id: TorrentId, path: &Path) -> Result<(), RegistryError> {
        Ok(self.get(id).await?.move_storage(path).await?)
    }

    /// Per-torrent download cap in KiB/s (0 = unlimited).
    pub async fn set_download_limit(&self, id: TorrentId, kib: u64) -> Result<(), RegistryError> {
        let handle = self.get(id).await?;
        handle.set_download_limit(kib_to_bytes(kib)?).await?;
        Ok(())
    }

    /// Per-torrent upload cap in KiB/s (0 = unlimited).
    pub async fn set_upload_limit(&self, id: TorrentId, kib: u64) -> Result<(), RegistryError> {
        let handle = self.get(id).await?;
        handle.set_upload_limit(kib_to_bytes(kib)?).await?;
        Ok(())
    }

    /// Write the torrent's descriptor to `path`.
    pub async fn export(&self, id: TorrentId, path: &Path) -> Result<(), RegistryError> {
        let data = self.get(id).await?.export_descriptor().await?;
        tokio::fs::write(path, data).await?;
        info!(torrent_id = id, path = %path.display(), "Descriptor exported");
        Ok(())
    }

    pub async fn peers(&self, id: TorrentId) -> Result<Vec<PeerInfo>, RegistryError> {
        Ok(self.get(id).await?.peer_info().await?)
    }

    pub async fn pieces(&self, id: TorrentId) -> Result<Vec<u32>, RegistryError> {
        Ok(self.get(id).await?.piece_availability().await?)
    }

    /// Sum of transfer totals, rates and peers over every torrent.
    pub async fn session_stats(&self) -> SessionStats {
        let handles = self.get_all().await;
        let mut stats = SessionStats {
            num_torrents: handles.len(),
            ..SessionStats::default()
        };
        for (id, handle) in handles {
            match handle.status().await {
                Ok(status) => {
                    stats.total_download += status.total_download;
                    stats.total_upload += status.total_upload;
                    stats.download_rate += status.download_rate;
                    stats.upload_rate += status.upload_rate;
                    stats.num_peers += status.num_peers;
                }
                Err(e) => {
                    warn!(torrent_id = id, error = %e, "Skipping torrent in session stats");
                }
            }
        }
        stats
    }
}

fn check_priority(priority: u8) -> Result<(), RegistryError> {
    if priority > MAX_PRIORITY {
        return Err(RegistryError::InvalidArgument(format!(
            "priority must be between 0 and {}, got {}",
            MAX_PRIORITY, priority
        )));
    }
    Ok(())
}

fn kib_to_bytes(kib: u64) -> Result<u64, RegistryError> {
    kib.checked_mul(1024).ok_or_else(|| {
        RegistryError::InvalidArgument(format!("rate limit of {} KiB/s is too large", kib))
    })
}

async fn read_descriptor_file(path: &Path) -> Result<Vec<u8>, RegistryError> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(RegistryError::SourceNotFound(path.to_path_buf()));
    }
    tokio::fs::read(path)
        .await
        .map_err(|_| RegistryError::SourceNotFound(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockEngine};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn registry() -> (Arc<MockEngine>, TorrentRegistry) {
        let engine = Arc::new(MockEngine::new());
        let registry = TorrentRegistry::new(engine.clone(), "/downloads", false);
        (engine, registry)
    }

    fn descriptor_file(name: &str, length: u64) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&fixtures::single_file_descriptor(name, length))
            .unwrap();
        file
    }

    #[tokio::test]
    async fn test_add_magnet_assigns_ids_from_one() {
        let (_, registry) = registry();
        let a = registry.add(&fixtures::magnet("aaa", "Alpha")).await.unwrap();
        let b = registry.add(&fixtures::magnet("bbb", "Beta")).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_add_descriptor_file() {
        let (engine, registry) = registry();
        let file = descriptor_file("debian.iso", 8192);

        let id = registry.add(file.path().to_str().unwrap()).await.unwrap();
        let handle = registry.get(id).await.unwrap();
        assert_eq!(handle.name(), "debian.iso");
        assert!(engine.has_torrent(&handle.info_hash()).await);

        let added = engine.added_requests().await;
        assert_eq!(added[0].request.save_path(), Some(Path::new("/downloads")));
    }

    #[tokio::test]
    async fn test_add_missing_file_is_not_found() {
        let (_, registry) = registry();
        let err = registry.add("/nonexistent/file.torrent").await.unwrap_err();
        assert!(matches!(err, RegistryError::SourceNotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_add_directory_is_not_found() {
        let (_, registry) = registry();
        let dir = tempfile::tempdir().unwrap();
        let err = registry.add(dir.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, RegistryError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_add_corrupt_descriptor_is_invalid_format() {
        let (engine, registry) = registry();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"definitely not bencode").unwrap();

        let err = registry.add(file.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFormat(_)));
        assert_eq!(engine.torrent_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_bad_magnet_is_invalid_format() {
        let (_, registry) = registry();
        let err = registry.add("magnet:?dn=nohash").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFormat(_)));
    }

    #[tokio::test]
    async fn test_add_rejects_priority_above_seven() {
        let (engine, registry) = registry();
        let err = registry
            .add_with(
                &fixtures::magnet("abc", "A"),
                AddOptions::default().with_priority(8),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
        assert_eq!(engine.torrent_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_applies_options() {
        let (engine, registry) = registry();
        registry
            .add_with(
                &fixtures::magnet("abc", "A"),
                AddOptions::default().with_priority(7).with_sequential(true),
            )
            .await
            .unwrap();

        let state = engine.handle("abc").await.unwrap().snapshot().await;
        assert_eq!(state.priority, 7);
        assert!(state.sequential);
    }

    #[tokio::test]
    async fn test_auto_start_resumes() {
        let engine = Arc::new(MockEngine::new());
        let registry = TorrentRegistry::new(engine.clone(), "/downloads", true);
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        registry.pause(id).await.unwrap();
        assert_eq!(registry.status(id).await.unwrap().state, TorrentState::Paused);

        let id2 = registry.add(&fixtures::magnet("def", "B")).await.unwrap();
        assert_eq!(
            registry.status(id2).await.unwrap().state,
            TorrentState::Downloading
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_reports_existing_id() {
        let (_, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        let err = registry.add(&fixtures::magnet("abc", "A")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(existing) if existing == id));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_engine_failure_surfaces_as_engine_error() {
        let (engine, registry) = registry();
        engine.set_next_error(EngineError::Timeout).await;
        let err = registry.add(&fixtures::magnet("abc", "A")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Engine(EngineError::Timeout)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_forwards_delete_flag_and_never_reuses_ids() {
        let (engine, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        registry.remove(id, true).await.unwrap();

        assert!(registry.get(id).await.is_err());
        assert!(engine.removed().await[0].delete_data);

        let next = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        assert_eq!(next, id + 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found() {
        let (_, registry) = registry();
        assert!(matches!(
            registry.remove(42, false).await,
            Err(RegistryError::TorrentNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_failed_engine_remove_keeps_record() {
        let (engine, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        engine
            .set_next_error(EngineError::Session("disk busy".into()))
            .await;
        assert!(registry.remove(id, false).await.is_err());
        assert!(registry.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_all_is_a_snapshot() {
        let (_, registry) = registry();
        registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        let snapshot = registry.get_all().await;
        registry.add(&fixtures::magnet("def", "B")).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.get_all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_search_case_insensitive() {
        let (_, registry) = registry();
        let ubuntu = registry
            .add(&fixtures::magnet("a1", "Ubuntu 24.04 Desktop"))
            .await
            .unwrap();
        registry.add(&fixtures::magnet("b2", "Debian 12")).await.unwrap();

        let hits = registry.search("uBuNtU").await;
        assert_eq!(hits.keys().copied().collect::<Vec<_>>(), vec![ubuntu]);
        assert!(registry.search("fedora").await.is_empty());
    }

    #[tokio::test]
    async fn test_priority_validation() {
        let (_, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        assert!(matches!(
            registry.set_priority(id, 9).await,
            Err(RegistryError::InvalidArgument(_))
        ));
        registry.set_priority(id, 0).await.unwrap();
        assert_eq!(registry.priority(id).await.unwrap(), 0);
        assert!(matches!(
            registry.set_priority(99, 3).await,
            Err(RegistryError::TorrentNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_file_priority() {
        let (_, registry) = registry();
        let file = descriptor_file("one.bin", 100);
        let id = registry.add(file.path().to_str().unwrap()).await.unwrap();

        registry.set_file_priority(id, 0, 1).await.unwrap();
        assert_eq!(registry.files(id).await.unwrap()[0].priority, 1);
        assert!(matches!(
            registry.set_file_priority(id, 0, 8).await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(registry.set_file_priority(id, 5, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_add_and_remove_trackers() {
        let (_, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        let urls = vec![
            "udp://one:80".to_string(),
            "udp://two:80".to_string(),
            "udp://three:80".to_string(),
        ];
        registry.add_trackers(id, &urls).await.unwrap();
        registry
            .remove_trackers(id, &["udp://two:80".to_string()])
            .await
            .unwrap();
        assert_eq!(
            registry.trackers(id).await.unwrap(),
            vec!["udp://one:80", "udp://three:80"]
        );
    }

    #[tokio::test]
    async fn test_limits_convert_kib_to_bytes() {
        let (engine, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        registry.set_download_limit(id, 100).await.unwrap();
        registry.set_upload_limit(id, 10).await.unwrap();

        let state = engine.handle("abc").await.unwrap().snapshot().await;
        assert_eq!(state.download_limit, 100 * 1024);
        assert_eq!(state.upload_limit, 10 * 1024);
    }

    #[tokio::test]
    async fn test_oversized_limit_is_invalid_argument() {
        let (engine, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        assert!(matches!(
            registry.set_download_limit(id, u64::MAX).await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.set_upload_limit(id, u64::MAX / 1024 + 1).await,
            Err(RegistryError::InvalidArgument(_))
        ));

        let state = engine.handle("abc").await.unwrap().snapshot().await;
        assert_eq!(state.download_limit, 0);
        assert_eq!(state.upload_limit, 0);
    }

    #[tokio::test]
    async fn test_readd_racing_remove_leaves_no_dead_handle() {
        let (engine, registry) = registry();
        let registry = Arc::new(registry);
        let id = registry.add(&fixtures::magnet("aaa", "A")).await.unwrap();

        engine.set_add_delay(Duration::from_millis(100)).await;
        let readd = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.add(&fixtures::magnet("aaa", "A")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.remove(id, false).await.unwrap();

        let readd = readd.await.unwrap();
        assert!(matches!(readd, Err(RegistryError::Duplicate(existing)) if existing == id));
        assert!(registry.is_empty().await);
        assert_eq!(engine.torrent_count().await, 0);
    }

    #[tokio::test]
    async fn test_export_writes_descriptor() {
        let (_, registry) = registry();
        let bytes = fixtures::single_file_descriptor("x.iso", 64);
        let id = registry
            .add_descriptor(bytes.clone(), None, AddOptions::default())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.torrent");
        registry.export(id, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_export_magnet_without_metadata_fails() {
        let (_, registry) = registry();
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(registry.export(id, &dir.path().join("a.torrent")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_state() {
        let (_, registry) = registry();
        let a = registry.add(&fixtures::magnet("a", "A")).await.unwrap();
        registry.add(&fixtures::magnet("b", "B")).await.unwrap();
        registry.pause(a).await.unwrap();

        let paused = registry.list(Some(TorrentState::Paused)).await;
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].id, a);
        assert_eq!(registry.list(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_session_stats_sums_and_skips_failures() {
        let (engine, registry) = registry();
        registry.add(&fixtures::magnet("a", "A")).await.unwrap();
        registry.add(&fixtures::magnet("b", "B")).await.unwrap();
        registry.add(&fixtures::magnet("c", "C")).await.unwrap();
        engine.set_speeds("a", 100, 10).await;
        engine.set_speeds("b", 50, 5).await;
        engine.set_transferred("a", 1000, 200).await;
        engine.set_failing("c", true).await;

        let stats = registry.session_stats().await;
        assert_eq!(stats.num_torrents, 3);
        assert_eq!(stats.download_rate, 150);
        assert_eq!(stats.upload_rate, 15);
        assert_eq!(stats.total_download, 1000);
        assert_eq!(stats.total_upload, 200);
    }
}
