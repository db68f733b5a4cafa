//! Remote data service interface and implementations
//!
//! The remote store owns the roster and the match log. The coordinator only
//! ever needs the three read operations defined here, whatever the transport.

use crate::error::LadderError;
use crate::types::{Match, PlayerRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Full contents of a remote ladder: roster plus match log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderDataset {
    pub players: Vec<PlayerRecord>,
    pub matches: Vec<Match>,
}

impl LadderDataset {
    /// Chronologically latest match, ties broken by id
    pub fn latest_match(&self) -> Option<&Match> {
        self.matches.iter().max_by_key(|m| m.fingerprint())
    }
}

/// Trait for reading ladder data from the remote store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Full roster
    async fn list_players(&self) -> crate::error::Result<Vec<PlayerRecord>>;

    /// Full match log, in no particular order
    async fn list_matches(&self) -> crate::error::Result<Vec<Match>>;

    /// Only the chronologically latest match, if any
    async fn latest_match(&self) -> crate::error::Result<Option<Match>>;
}

/// Number of calls made to each remote operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCallCounts {
    pub list_players: usize,
    pub list_matches: usize,
    pub latest_match: usize,
}

/// In-memory remote service for tests and local development
///
/// Counts every call, and can simulate latency and outages.
#[derive(Debug, Default)]
pub struct InMemoryRemoteService {
    dataset: RwLock<LadderDataset>,
    latency: RwLock<Duration>,
    failure: RwLock<Option<String>>,
    list_players_calls: AtomicUsize,
    list_matches_calls: AtomicUsize,
    latest_match_calls: AtomicUsize,
}

impl InMemoryRemoteService {
    /// Create a new service serving the given dataset
    pub fn new(dataset: LadderDataset) -> Self {
        Self {
            dataset: RwLock::new(dataset),
            ..Default::default()
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
        self
    }

    /// Make every subsequent call fail with `message`, or recover with `None`
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = message.map(str::to_string);
        }
    }

    /// Record a new match
    pub fn push_match(&self, record: Match) -> crate::error::Result<()> {
        let mut dataset =
            self.dataset
                .write()
                .map_err(|_| LadderError::InternalError {
                    message: "Failed to acquire dataset write lock".to_string(),
                })?;
        dataset.matches.push(record);
        Ok(())
    }

    /// Add a player to the roster
    pub fn push_player(&self, player: PlayerRecord) -> crate::error::Result<()> {
        let mut dataset =
            self.dataset
                .write()
                .map_err(|_| LadderError::InternalError {
                    message: "Failed to acquire dataset write lock".to_string(),
                })?;
        dataset.players.push(player);
        Ok(())
    }

    /// Get call counts (for testing)
    pub fn call_counts(&self) -> RemoteCallCounts {
        RemoteCallCounts {
            list_players: self.list_players_calls.load(Ordering::SeqCst),
            list_matches: self.list_matches_calls.load(Ordering::SeqCst),
            latest_match: self.latest_match_calls.load(Ordering::SeqCst),
        }
    }

    async fn simulate_transport(&self) -> crate::error::Result<()> {
        let latency = self.latency.read().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failure.read().ok().and_then(|f| f.clone());
        match failure {
            Some(message) => Err(LadderError::remote(message).into()),
            None => Ok(()),
        }
    }

    fn read_dataset<T>(&self, read: impl FnOnce(&LadderDataset) -> T) -> crate::error::Result<T> {
        let dataset = self
            .dataset
            .read()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire dataset read lock".to_string(),
            })?;
        Ok(read(&dataset))
    }
}

#[async_trait]
impl RemoteDataService for InMemoryRemoteService {
    async fn list_players(&self) -> crate::error::Result<Vec<PlayerRecord>> {
        self.list_players_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        let players = self.read_dataset(|d| d.players.clone())?;
        debug!("Serving {} players", players.len());
        Ok(players)
    }

    async fn list_matches(&self) -> crate::error::Result<Vec<Match>> {
        self.list_matches_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        let matches = self.read_dataset(|d| d.matches.clone())?;
        debug!("Serving {} matches", matches.len());
        Ok(matches)
    }

    async fn latest_match(&self) -> crate::error::Result<Option<Match>> {
        self.latest_match_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        self.read_dataset(|d| d.latest_match().cloned())
    }
}
