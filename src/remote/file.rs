//! JSON file backed remote service
//!
//! Reads a `LadderDataset` document from disk on every call, so edits to the
//! file show up the same way new rows in a remote database would.

use crate::error::LadderError;
use crate::remote::provider::{LadderDataset, RemoteDataService};
use crate::types::{Match, PlayerRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remote service reading the ladder from a JSON document
#[derive(Debug, Clone)]
pub struct JsonFileRemoteService {
    path: PathBuf,
}

impl JsonFileRemoteService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> crate::error::Result<LadderDataset> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            LadderError::remote(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let dataset: LadderDataset = serde_json::from_str(&raw).map_err(|e| {
            LadderError::remote(format!("invalid dataset {}: {}", self.path.display(), e))
        })?;
        debug!(
            "Read {} players and {} matches from {}",
            dataset.players.len(),
            dataset.matches.len(),
            self.path.display()
        );
        Ok(dataset)
    }
}

#[async_trait]
impl RemoteDataService for JsonFileRemoteService {
    async fn list_players(&self) -> crate::error::Result<Vec<PlayerRecord>> {
        Ok(self.load().await?.players)
    }

    async fn list_matches(&self) -> crate::error::Result<Vec<Match>> {
        Ok(self.load().await?.matches)
    }

    async fn latest_match(&self) -> crate::error::Result<Option<Match>> {
        let dataset = self.load().await?;
        Ok(dataset.latest_match().cloned())
    }
}
