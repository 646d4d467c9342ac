//! Integration tests for the file-backed durable tier
//!
//! Runs the registry over a real `FilePersister` in a temporary directory:
//! read-through after a restart, fetched values persisted once per fetch,
//! and clears reaching the disk.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use recache_core::{CacheConfig, KeyedCacheRegistry, NoopLogger, Persister};
use recache_infra::FilePersister;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PriceTick {
    symbol: String,
    cents: u64,
}

fn tick(cents: u64) -> PriceTick {
    PriceTick { symbol: "ACME".to_string(), cents }
}

async fn registry_over(dir: &TempDir) -> (KeyedCacheRegistry<PriceTick>, Arc<FilePersister<PriceTick>>) {
    let persister = Arc::new(FilePersister::open(dir.path()).await.unwrap());
    let registry = KeyedCacheRegistry::<PriceTick>::builder(CacheConfig::ttl(Duration::from_secs(60)))
        .persister(persister.clone())
        .logger(Arc::new(NoopLogger))
        .build()
        .unwrap();
    (registry, persister)
}

/// Verifies that a fresh registry over the same directory serves the
/// persisted history without calling upstream.
///
/// # Test Steps
/// 1. Fetch one tick and push two more through the first registry
/// 2. Drop it and open a second registry on the same directory
/// 3. Read the key: the producer must not run and all three ticks return
#[tokio::test]
async fn test_history_restored_after_restart() {
    let dir = TempDir::new().unwrap();
    {
        let (registry, _) = registry_over(&dir).await;
        let slot = registry.slot_for("ACME").unwrap();
        slot.read(|| async { Ok::<_, io::Error>(tick(100)) }).await.unwrap();
        slot.add_all(vec![tick(101), tick(102)]).await.unwrap();
    }

    let (registry, _) = registry_over(&dir).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let restored = registry
        .slot_for("ACME")
        .unwrap()
        .read(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(tick(999))
        })
        .await
        .unwrap()
        .into_vec();

    assert_eq!(restored, vec![tick(100), tick(101), tick(102)]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Verifies that a coalesced fetch is written to disk exactly once.
#[tokio::test]
async fn test_coalesced_fetch_persisted_once() {
    let dir = TempDir::new().unwrap();
    let (registry, persister) = registry_over(&dir).await;
    let slot = registry.slot_for("ACME").unwrap();

    let reads = (0..8).map(|_| {
        slot.read(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, io::Error>(tick(250))
        })
    });
    let results = join_all(reads).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(persister.read("ACME").await.unwrap(), vec![tick(250)]);
}

/// Verifies that per-key and global clears reach the disk.
#[tokio::test]
async fn test_clears_reach_disk() {
    let dir = TempDir::new().unwrap();
    let (registry, persister) = registry_over(&dir).await;
    registry.slot_for("A").unwrap().add(tick(1)).await.unwrap();
    registry.slot_for("B").unwrap().add(tick(2)).await.unwrap();

    registry.clear_key("A").await;
    assert!(persister.read("A").await.unwrap().is_empty());
    assert_eq!(persister.read("B").await.unwrap(), vec![tick(2)]);

    registry.clear().await;
    assert!(persister.read("B").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_invalidates_persisted_history() {
    let dir = TempDir::new().unwrap();
    let (registry, persister) = registry_over(&dir).await;
    registry.slot_for("A").unwrap().add(tick(1)).await.unwrap();

    registry.shutdown().await;

    assert!(persister.read("A").await.unwrap().is_empty());
    assert!(registry.slot_for("A").is_err());
}
