//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use doubles_ladder::cache::{CacheCoordinator, Clock, InMemorySnapshotStore, SnapshotStore};
use doubles_ladder::config::CacheConfig;
use doubles_ladder::error::Result;
use doubles_ladder::rating::DoublesRatingEngine;
use doubles_ladder::remote::{LadderDataset, RemoteDataService};
use doubles_ladder::types::{Match, MatchId, PlayerId, PlayerRecord, SetScore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed reference time all fixtures are built around
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 19, 0, 0).unwrap()
}

/// `days` days after the reference time
pub fn day(days: i64) -> DateTime<Utc> {
    epoch() + Duration::days(days)
}

/// Four-player roster: Ana (1), Bruno (2), Carla (3), Duarte (4)
pub fn roster() -> Vec<PlayerRecord> {
    vec![
        PlayerRecord::new(1, "Ana"),
        PlayerRecord::new(2, "Bruno"),
        PlayerRecord::new(3, "Carla"),
        PlayerRecord::new(4, "Duarte"),
    ]
}

/// A match with its winner derived from the set scores
pub fn doubles_match(
    id: MatchId,
    days: i64,
    team_a: [PlayerId; 2],
    team_b: [PlayerId; 2],
    sets: &[(u8, u8)],
) -> Match {
    Match::from_sets(
        id,
        day(days),
        team_a,
        team_b,
        sets.iter().map(|&(a, b)| SetScore::new(a, b)).collect(),
    )
}

/// Ana and Bruno beat Carla and Duarte 6-2 6-3
pub fn worked_example() -> LadderDataset {
    LadderDataset {
        players: roster(),
        matches: vec![doubles_match(1, 0, [1, 2], [3, 4], &[(6, 2), (6, 3)])],
    }
}

/// A short season with one malformed match referencing an unknown player
pub fn season() -> LadderDataset {
    LadderDataset {
        players: roster(),
        matches: vec![
            doubles_match(1, 0, [1, 2], [3, 4], &[(6, 2), (6, 3)]),
            doubles_match(2, 7, [1, 3], [2, 4], &[(4, 6), (6, 3), (7, 5)]),
            doubles_match(3, 14, [1, 4], [2, 3], &[(2, 6), (3, 6)]),
            doubles_match(4, 15, [1, 9], [2, 3], &[(6, 0), (6, 0)]),
            doubles_match(5, 21, [2, 4], [1, 3], &[(6, 4), (4, 6), (6, 7)]),
        ],
    }
}

/// Coordinator over the given remote, store and clock with default settings
pub fn coordinator(
    remote: Arc<dyn RemoteDataService>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
) -> CacheCoordinator {
    CacheCoordinator::new(
        remote,
        store,
        Arc::new(DoublesRatingEngine::default()),
        CacheConfig::default(),
    )
    .with_clock(clock)
}

/// Snapshot store counting writes, wrapping an in-memory store
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: InMemorySnapshotStore,
    sets: AtomicUsize,
    removes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemorySnapshotStore {
        &self.inner
    }

    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key).await
    }
}
