//! Concurrency tests for the cache coordinator
//!
//! Many readers hitting an empty or expired cache at once must share a
//! single remote refill, and share its failure too.

mod fixtures;

use doubles_ladder::cache::{CacheCoordinator, InMemorySnapshotStore, ManualClock};
use doubles_ladder::error::LadderError;
use doubles_ladder::remote::{InMemoryRemoteService, RemoteCallCounts};
use doubles_ladder::types::DataKind;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use fixtures::{coordinator, day, season};

fn slow_remote(latency_ms: u64) -> Arc<InMemoryRemoteService> {
    Arc::new(InMemoryRemoteService::new(season()).with_latency(Duration::from_millis(latency_ms)))
}

fn build(remote: Arc<InMemoryRemoteService>) -> CacheCoordinator {
    coordinator(
        remote,
        Arc::new(InMemorySnapshotStore::new()),
        Arc::new(ManualClock::new(day(30))),
    )
}

#[tokio::test]
async fn test_concurrent_gets_share_one_refill() {
    let remote = slow_remote(50);
    let coordinator = build(remote.clone());

    let reads = (0..16).map(|i| {
        let kind = if i % 2 == 0 {
            DataKind::Players
        } else {
            DataKind::Matches
        };
        coordinator.get(kind)
    });
    let results = join_all(reads).await;

    let snapshots: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(
        remote.call_counts(),
        RemoteCallCounts {
            list_players: 1,
            list_matches: 1,
            latest_match: 0,
        }
    );
    assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_across_tasks_share_one_refill() {
    let remote = slow_remote(100);
    let coordinator = Arc::new(build(remote.clone()));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.get_player_stats().await })
        })
        .collect();

    for result in join_all(handles).await {
        let players = result.unwrap().unwrap();
        assert_eq!(players.len(), 4);
    }
    assert_eq!(remote.call_counts().list_players, 1);
    assert_eq!(remote.call_counts().list_matches, 1);
}

#[tokio::test]
async fn test_failure_reaches_every_waiter() {
    let remote = slow_remote(50);
    remote.set_failure(Some("connection refused"));
    let coordinator = build(remote.clone());

    let results = join_all((0..8).map(|_| coordinator.get(DataKind::Players))).await;

    for result in results {
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<LadderError>(),
            Some(&LadderError::RemoteFetch {
                message: "connection refused".to_string()
            })
        );
    }
    assert_eq!(remote.call_counts().list_players, 1);
    assert!(!coordinator.get_cache_info().has_data);

    // A later read starts a fresh attempt
    remote.set_failure(None);
    coordinator.get(DataKind::Players).await.unwrap();
    assert_eq!(remote.call_counts().list_players, 2);
}

#[tokio::test]
async fn test_refresh_joins_refill_in_flight() {
    let remote = slow_remote(50);
    let coordinator = build(remote.clone());

    let (read, refresh) = tokio::join!(coordinator.get(DataKind::Matches), coordinator.refresh());
    let read = read.unwrap();
    let refresh = refresh.unwrap();

    assert!(Arc::ptr_eq(&read, &refresh));
    assert_eq!(remote.call_counts().list_matches, 1);
}

#[tokio::test]
async fn test_is_loading_while_refill_in_flight() {
    let remote = slow_remote(200);
    let coordinator = Arc::new(build(remote));

    let loader = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.load().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let info = coordinator.get_cache_info();
    assert!(info.is_loading);
    assert!(!info.has_data);

    loader.await.unwrap().unwrap();
    let info = coordinator.get_cache_info();
    assert!(!info.is_loading);
    assert!(info.is_valid);
}

#[tokio::test]
async fn test_sequential_loads_each_fetch() {
    let remote = slow_remote(0);
    let coordinator = build(remote.clone());

    coordinator.load().await.unwrap();
    coordinator.load().await.unwrap();
    assert_eq!(remote.call_counts().list_players, 2);
}
