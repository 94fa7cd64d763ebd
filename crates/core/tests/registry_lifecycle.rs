//! Registry lifecycle integration tests.
//!
//! These tests drive the registry the way the CLI and the background loops
//! do: concurrent adds, removals, and lookups against a mock engine.

use std::collections::HashSet;
use std::sync::Arc;

use tamer_core::{
    registry::RegistryError,
    testing::{fixtures, MockEngine},
    TorrentRegistry,
};

fn setup() -> (Arc<MockEngine>, Arc<TorrentRegistry>) {
    let engine = Arc::new(MockEngine::new());
    let registry = Arc::new(TorrentRegistry::new(engine.clone(), "/downloads", false));
    (engine, registry)
}

#[tokio::test]
async fn test_concurrent_adds_get_unique_ids() {
    let (engine, registry) = setup();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .add(&fixtures::magnet(&format!("{i:040x}"), &format!("Torrent {i}")))
                .await
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap().unwrap());
    }

    assert_eq!(ids.len(), 32);
    assert_eq!(ids.iter().min(), Some(&1));
    assert_eq!(ids.iter().max(), Some(&32));
    assert_eq!(registry.len().await, 32);
    assert_eq!(engine.torrent_count().await, 32);
}

#[tokio::test]
async fn test_ids_are_never_reused() {
    let (_, registry) = setup();
    let mut adds = 0;
    let mut removes = 0;
    let mut seen = HashSet::new();

    for round in 0..5 {
        let a = registry
            .add(&fixtures::magnet(&format!("a{round}"), "A"))
            .await
            .unwrap();
        let b = registry
            .add(&fixtures::magnet(&format!("b{round}"), "B"))
            .await
            .unwrap();
        adds += 2;
        assert!(seen.insert(a));
        assert!(seen.insert(b));

        registry.remove(a, false).await.unwrap();
        removes += 1;
        assert_eq!(registry.get_all().await.len(), adds - removes);
    }

    let ids: Vec<_> = registry.get_all().await.into_keys().collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_removed_id_is_not_found() {
    let (_, registry) = setup();
    let id = registry.add(&fixtures::magnet("aaa", "A")).await.unwrap();
    registry.remove(id, true).await.unwrap();

    assert!(matches!(
        registry.pause(id).await,
        Err(RegistryError::TorrentNotFound(_))
    ));
    assert!(matches!(
        registry.remove(id, false).await,
        Err(RegistryError::TorrentNotFound(_))
    ));
}

#[tokio::test]
async fn test_search_returns_exact_case_insensitive_subset() {
    let (_, registry) = setup();
    let names = ["Ubuntu 24.04 Desktop", "Debian 12", "ubuntu server", "Fedora"];
    for (i, name) in names.iter().enumerate() {
        registry
            .add(&fixtures::magnet(&format!("h{i}"), name))
            .await
            .unwrap();
    }

    let found: Vec<String> = registry
        .search("UBUNTU")
        .await
        .values()
        .map(|h| h.name())
        .collect();
    assert_eq!(found, vec!["Ubuntu 24.04 Desktop", "ubuntu server"]);

    assert!(registry.search("arch").await.is_empty());
    assert_eq!(registry.search("").await.len(), names.len());
}

#[tokio::test]
async fn test_concurrent_duplicate_adds_register_once() {
    let (_, registry) = setup();
    let magnet = fixtures::magnet("dupe", "Same");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let magnet = magnet.clone();
        tasks.push(tokio::spawn(async move { registry.add(&magnet).await }));
    }

    let mut ok = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(RegistryError::Duplicate(_)) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(registry.len().await, 1);
}
