//! Cache coordinator
//!
//! Owns the current snapshot and keeps it coherent with the remote store.
//! Reads are served from memory while the snapshot is valid. A refill runs
//! under `load_slot`: the caller that takes the lock fetches, replays and
//! installs; callers queued behind it find the load generation advanced and
//! take the stored outcome instead of fetching again.

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::snapshot::{PersistedSnapshot, Snapshot, SnapshotKeys};
use crate::cache::store::SnapshotStore;
use crate::config::CacheConfig;
use crate::error::{LadderError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::{DoublesRatingEngine, HistoryReplayer, MatchPreview};
use crate::remote::RemoteDataService;
use crate::types::{
    CacheInfo, DataKind, Match, PlayerId, PlayerRecord, PlayerStats, RatingPoint,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type LoadOutcome = std::result::Result<Arc<Snapshot>, LadderError>;

/// A player's statistics with their rating after every applied match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerHistory {
    pub stats: PlayerStats,
    pub history: Vec<RatingPoint>,
}

/// Coordinates snapshot reads, refills and staleness probes
pub struct CacheCoordinator {
    remote: Arc<dyn RemoteDataService>,
    store: Arc<dyn SnapshotStore>,
    engine: Arc<DoublesRatingEngine>,
    replayer: HistoryReplayer,
    config: CacheConfig,
    keys: SnapshotKeys,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsCollector>>,

    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Set by `refresh`, cleared when a new snapshot is installed
    expired: AtomicBool,
    /// Held for the whole refill; keeps the last outcome for joiners
    load_slot: Mutex<Option<LoadOutcome>>,
    /// Number of finished refills
    load_generation: AtomicU64,
    persistence_degraded: AtomicBool,
}

impl CacheCoordinator {
    /// Create a new coordinator with an empty snapshot
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        store: Arc<dyn SnapshotStore>,
        engine: Arc<DoublesRatingEngine>,
        config: CacheConfig,
    ) -> Self {
        let keys = SnapshotKeys::new(&config.key_prefix);
        Self {
            remote,
            store,
            replayer: HistoryReplayer::new(engine.clone()),
            engine,
            config,
            keys,
            clock: Arc::new(SystemClock),
            metrics: None,
            snapshot: RwLock::new(None),
            expired: AtomicBool::new(false),
            load_slot: Mutex::new(None),
            load_generation: AtomicU64::new(0),
            persistence_degraded: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn engine(&self) -> &DoublesRatingEngine {
        &self.engine
    }

    /// Hydrate from the persistent store, falling back to a remote load
    pub async fn warm_up(&self) -> Result<Arc<Snapshot>> {
        if self.hydrate().await {
            if let Some(snapshot) = self.current_snapshot() {
                return Ok(snapshot);
            }
        }
        self.load().await
    }

    /// Try to install the persisted snapshot
    ///
    /// Returns true when a complete, parseable and unexpired snapshot was
    /// found. Anything else leaves the coordinator empty.
    pub async fn hydrate(&self) -> bool {
        let persisted = match self.read_persisted().await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Persistent store unavailable during hydration: {}", e);
                self.note_persistence_failure("read");
                return false;
            }
        };

        let snapshot = match persisted.decode(&self.keys) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No complete persisted snapshot under {}", self.config.key_prefix);
                return false;
            }
            Err(e) => {
                warn!("Ignoring persisted snapshot: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_persistence_failure("decode");
                }
                return false;
            }
        };

        if !snapshot.is_valid_at(self.clock.now(), self.config.ttl()) {
            info!(
                "Persisted snapshot from {} has expired, ignoring it",
                snapshot.created_at
            );
            return false;
        }

        info!(
            "Hydrated snapshot from {} with {} players and {} matches",
            snapshot.created_at,
            snapshot.players.len(),
            snapshot.matches.len()
        );
        self.install(Arc::new(snapshot));
        true
    }

    /// Get a valid snapshot, refilling from the remote store when needed
    pub async fn get(&self, kind: DataKind) -> Result<Arc<Snapshot>> {
        // Read before checking validity, so a refill finishing in between
        // is joined instead of repeated.
        let seen = self.load_generation.load(Ordering::Acquire);

        if let Some(snapshot) = self.valid_snapshot() {
            debug!("Cache hit for {}", kind.as_str());
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_request(kind, true);
            }
            return Ok(snapshot);
        }

        debug!("Cache miss for {}", kind.as_str());
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_request(kind, false);
        }
        self.load_after(seen).await
    }

    /// Refill from the remote store, joining a refill already in flight
    pub async fn load(&self) -> Result<Arc<Snapshot>> {
        let seen = self.load_generation.load(Ordering::Acquire);
        self.load_after(seen).await
    }

    /// Expire the current snapshot and refill
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        info!("Refresh requested");
        self.expired.store(true, Ordering::Release);
        self.load().await
    }

    /// Compare the local fingerprint with the remote latest match
    ///
    /// Returns true when the snapshot is missing, has no fingerprint, or the
    /// fingerprints differ in any way.
    pub async fn check_staleness(&self) -> Result<bool> {
        let local = self.current_snapshot().and_then(|s| s.latest_match);

        let probe = self.bounded(self.remote.latest_match()).await;
        let remote = match probe {
            Ok(Ok(latest)) => latest.as_ref().map(Match::fingerprint),
            Ok(Err(e)) => return Err(self.failed_probe(format!("{:#}", e))),
            Err(limit) => {
                return Err(self.failed_probe(format!("timed out after {:?}", limit)));
            }
        };

        let stale = match local {
            None => true,
            Some(local) => remote != Some(local),
        };
        debug!(
            "Staleness check: local {:?}, remote {:?}, stale {}",
            local, remote, stale
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_staleness_check(Some(stale));
        }
        Ok(stale)
    }

    /// Probe and refill when stale; returns whether a refill happened
    ///
    /// A failed probe counts as stale.
    pub async fn check_and_reload_if_stale(&self) -> Result<bool> {
        let stale = match self.check_staleness().await {
            Ok(stale) => stale,
            Err(e) => {
                warn!("{}; reloading to be safe", e);
                true
            }
        };

        if !stale {
            debug!("Snapshot is up to date");
            return Ok(false);
        }

        info!("Remote data changed, reloading");
        self.load().await?;
        Ok(true)
    }

    /// Drop the in-memory snapshot and every persisted entry
    pub async fn invalidate(&self) {
        match self.snapshot.write() {
            Ok(mut current) => *current = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }

        for key in self.keys.all() {
            if let Err(e) = self.store.remove(key).await {
                warn!("Failed to remove persisted {}: {}", key, e);
                self.note_persistence_failure("remove");
            }
        }
        info!("Cache invalidated");
    }

    /// Player statistics in standings order
    pub async fn get_player_stats(&self) -> Result<Vec<PlayerStats>> {
        Ok(self.get(DataKind::Players).await?.players.clone())
    }

    /// Match log, newest first
    pub async fn get_matches(&self) -> Result<Vec<Match>> {
        Ok(self.get(DataKind::Matches).await?.matches.clone())
    }

    pub async fn get_player_history(&self, player_id: PlayerId) -> Result<PlayerHistory> {
        let snapshot = self.get(DataKind::Players).await?;
        let stats = snapshot
            .player(player_id)
            .cloned()
            .ok_or(LadderError::PlayerNotFound { player_id })?;
        Ok(PlayerHistory {
            stats,
            history: snapshot.history(player_id).to_vec(),
        })
    }

    /// Predict a prospective match from current ratings
    pub async fn preview_match(
        &self,
        team_a: [PlayerId; 2],
        team_b: [PlayerId; 2],
    ) -> Result<MatchPreview> {
        let ids = [team_a[0], team_a[1], team_b[0], team_b[1]];
        let mut distinct = HashSet::with_capacity(4);
        if let Some(duplicate) = ids.iter().find(|id| !distinct.insert(**id)) {
            return Err(LadderError::InvalidPreview {
                reason: format!("player {} appears more than once", duplicate),
            }
            .into());
        }

        let snapshot = self.get(DataKind::Players).await?;
        let rated = |player_id: PlayerId| -> Result<(PlayerId, i32)> {
            snapshot
                .player(player_id)
                .map(|p| (player_id, p.current_rating))
                .ok_or_else(|| LadderError::PlayerNotFound { player_id }.into())
        };

        Ok(self.engine.preview(
            [rated(team_a[0])?, rated(team_a[1])?],
            [rated(team_b[0])?, rated(team_b[1])?],
        ))
    }

    pub fn get_cache_info(&self) -> CacheInfo {
        let snapshot = self.current_snapshot();
        CacheInfo {
            has_data: snapshot.is_some(),
            is_valid: self.valid_snapshot().is_some(),
            last_updated: snapshot.as_ref().map(|s| s.created_at),
            is_loading: self.load_slot.try_lock().is_err(),
            latest_match: snapshot.as_ref().and_then(|s| s.latest_match),
            player_count: snapshot.as_ref().map_or(0, |s| s.players.len()),
            match_count: snapshot.as_ref().map_or(0, |s| s.matches.len()),
            skipped_matches: snapshot.as_ref().map_or(0, |s| s.skipped.len()),
            persistence_degraded: self.persistence_degraded.load(Ordering::Acquire),
        }
    }

    /// The installed snapshot, valid or not
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        match self.snapshot.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn valid_snapshot(&self) -> Option<Arc<Snapshot>> {
        if self.expired.load(Ordering::Acquire) {
            return None;
        }
        let now = self.clock.now();
        self.current_snapshot()
            .filter(|s| s.is_valid_at(now, self.config.ttl()))
    }

    fn install(&self, snapshot: Arc<Snapshot>) {
        if let Some(metrics) = &self.metrics {
            metrics.update_snapshot_size(snapshot.players.len(), snapshot.matches.len());
        }
        match self.snapshot.write() {
            Ok(mut current) => *current = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
        self.expired.store(false, Ordering::Release);
    }

    async fn load_after(&self, seen: u64) -> Result<Arc<Snapshot>> {
        let mut slot = self.load_slot.lock().await;

        if self.load_generation.load(Ordering::Acquire) != seen {
            if let Some(outcome) = slot.as_ref() {
                debug!("Joined a refill that finished while waiting");
                if let Some(metrics) = &self.metrics {
                    metrics.record_joined_load();
                }
                return outcome.clone().map_err(Into::into);
            }
        }

        let started = Instant::now();
        info!("Loading ladder data from remote store");
        let outcome = self.refill().await;

        match &outcome {
            Ok(snapshot) => info!(
                "Loaded {} players and {} matches ({} skipped) in {:?}",
                snapshot.players.len(),
                snapshot.matches.len(),
                snapshot.skipped.len(),
                started.elapsed()
            ),
            Err(e) => warn!("Refill failed, keeping previous snapshot: {}", e),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_load(outcome.is_ok(), started.elapsed());
        }

        *slot = Some(outcome.clone());
        self.load_generation.fetch_add(1, Ordering::AcqRel);
        outcome.map_err(Into::into)
    }

    async fn refill(&self) -> LoadOutcome {
        let (players, matches) = self.fetch_remote().await?;

        let replay = self
            .replayer
            .replay(&players, &matches)
            .map_err(|e| match e.downcast::<LadderError>() {
                Ok(ladder) => ladder,
                Err(other) => LadderError::ReplayFailed {
                    reason: format!("{:#}", other),
                },
            })?;
        if let Some(metrics) = &self.metrics {
            for skipped in &replay.skipped {
                metrics.record_skipped_match(skipped.reason.label());
            }
        }

        let snapshot = Arc::new(Snapshot::from_replay(replay, matches, self.clock.now()));
        self.install(snapshot.clone());
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    async fn fetch_remote(
        &self,
    ) -> std::result::Result<(Vec<PlayerRecord>, Vec<Match>), LadderError> {
        let fetch = async {
            tokio::try_join!(self.remote.list_players(), self.remote.list_matches())
        };

        match self.bounded(fetch).await {
            Ok(fetched) => fetched.map_err(|e| match e.downcast::<LadderError>() {
                Ok(ladder @ LadderError::RemoteFetch { .. }) => ladder,
                Ok(other) => LadderError::remote(other),
                Err(other) => LadderError::remote(format!("{:#}", other)),
            }),
            Err(limit) => Err(LadderError::remote(format!(
                "timed out after {:?}",
                limit
            ))),
        }
    }

    /// Run `fut` under the configured fetch timeout; `Err` carries the limit
    async fn bounded<F: Future>(&self, fut: F) -> std::result::Result<F::Output, Duration> {
        match self.config.fetch_timeout() {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
            None => Ok(fut.await),
        }
    }

    fn failed_probe(&self, message: String) -> anyhow::Error {
        if let Some(metrics) = &self.metrics {
            metrics.record_staleness_check(None);
        }
        LadderError::StalenessCheck { message }.into()
    }

    async fn read_persisted(&self) -> Result<PersistedSnapshot> {
        Ok(PersistedSnapshot {
            players: self.store.get(&self.keys.players).await?,
            matches: self.store.get(&self.keys.matches).await?,
            latest_match: self.store.get(&self.keys.latest_match).await?,
            derived: self.store.get(&self.keys.derived).await?,
            timestamp: self.store.get(&self.keys.timestamp).await?,
        })
    }

    async fn persist(&self, snapshot: &Snapshot) {
        let entries = match PersistedSnapshot::encode(snapshot, &self.keys) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Snapshot not persisted: {}", e);
                self.note_persistence_failure("write");
                return;
            }
        };

        // Without the timestamp a partially rewritten snapshot never hydrates
        if let Err(e) = self.store.remove(&self.keys.timestamp).await {
            warn!("Snapshot not persisted: {}", e);
            self.note_persistence_failure("write");
            return;
        }
        for (key, value) in &entries {
            if let Err(e) = self.store.set(key, value).await {
                warn!("Snapshot not persisted, continuing in memory only: {}", e);
                self.note_persistence_failure("write");
                return;
            }
        }

        if self.persistence_degraded.swap(false, Ordering::AcqRel) {
            info!("Persistent store recovered");
        }
    }

    fn note_persistence_failure(&self, operation: &str) {
        self.persistence_degraded.store(true, Ordering::Release);
        if let Some(metrics) = &self.metrics {
            metrics.record_persistence_failure(operation);
        }
    }
}
