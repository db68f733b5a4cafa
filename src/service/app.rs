//! Main application state and service coordination
//!
//! This module wires configuration into a running service: remote store,
//! persistent store, rating engine, metrics and the cache coordinator, plus
//! the background staleness poller.

use crate::cache::{CacheCoordinator, FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::rating::DoublesRatingEngine;
use crate::remote::{InMemoryRemoteService, JsonFileRemoteService, RemoteDataService};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Snapshot cache over the remote store
    coordinator: Arc<CacheCoordinator>,

    metrics: Arc<MetricsCollector>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application from configuration
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let remote: Arc<dyn RemoteDataService> = match &config.remote.dataset_path {
            Some(path) => {
                info!("Using dataset {} as remote store", path.display());
                Arc::new(JsonFileRemoteService::new(path))
            }
            None => {
                warn!("No dataset configured, serving an empty ladder");
                Arc::new(InMemoryRemoteService::default())
            }
        };

        let store: Arc<dyn SnapshotStore> = match &config.cache.store_dir {
            Some(dir) => {
                info!("Persisting snapshots under {}", dir.display());
                Arc::new(FileSnapshotStore::new(dir))
            }
            None => {
                info!("No cache directory configured, snapshots are kept in memory only");
                Arc::new(InMemorySnapshotStore::new())
            }
        };

        Self::with_components(config, remote, store)
    }

    /// Initialize the application around explicit remote and persistent stores
    pub fn with_components(
        config: AppConfig,
        remote: Arc<dyn RemoteDataService>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);

        let engine =
            DoublesRatingEngine::new(config.rating.clone()).map_err(|e| {
                ServiceError::Configuration {
                    message: format!("Invalid rating configuration: {}", e),
                }
            })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let coordinator = Arc::new(
            CacheCoordinator::new(remote, store, Arc::new(engine), config.cache.clone())
                .with_metrics(metrics.clone()),
        );

        Ok(Self {
            config,
            coordinator,
            metrics,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Warm the cache and start background tasks
    ///
    /// A failed warm-up is logged and left to the first read to retry.
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        match self.coordinator.warm_up().await {
            Ok(snapshot) => info!(
                "Cache warm with {} players and {} matches",
                snapshot.players.len(),
                snapshot.matches.len()
            ),
            Err(e) => warn!("Cache warm-up failed, first read will retry: {}", e),
        }

        self.start_background_tasks().await;

        info!("{} service started", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;
        self.stop_background_tasks().await;

        let info = self.coordinator.get_cache_info();
        info!(
            "Final cache state: {} players, {} matches, valid: {}",
            info.player_count, info.match_count, info.is_valid
        );
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn coordinator(&self) -> Arc<CacheCoordinator> {
        self.coordinator.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    async fn start_background_tasks(&self) {
        let Some(poll_interval) = self.config.cache.staleness_check_interval() else {
            info!("Background staleness checks disabled");
            return;
        };

        info!(
            "Starting staleness poller ({}s interval)...",
            poll_interval.as_secs()
        );
        let coordinator = self.coordinator.clone();
        let is_running = self.is_running.clone();

        let poller = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            // The first tick completes immediately; warm-up just ran
            interval.tick().await;

            while *is_running.read().await {
                interval.tick().await;

                match coordinator.check_and_reload_if_stale().await {
                    Ok(true) => info!("Staleness poller reloaded the snapshot"),
                    Ok(false) => debug!("Staleness poller found the snapshot current"),
                    Err(e) => warn!("Staleness poller reload failed: {}", e),
                }
            }

            info!("Staleness poller stopped");
        });

        self.background_tasks.lock().await.push(poller);
    }

    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            debug!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::LadderDataset;
    use crate::types::{Match, PlayerRecord, SetScore};
    use chrono::{TimeZone, Utc};

    fn dataset() -> LadderDataset {
        LadderDataset {
            players: (1..=4)
                .map(|id| PlayerRecord::new(id, format!("player{}", id)))
                .collect(),
            matches: vec![Match::from_sets(
                1,
                Utc.with_ymd_and_hms(2024, 2, 1, 19, 0, 0).unwrap(),
                [1, 2],
                [3, 4],
                vec![SetScore::new(6, 2), SetScore::new(6, 3)],
            )],
        }
    }

    #[tokio::test]
    async fn test_start_warms_cache_and_shutdown_stops() {
        let state = AppState::with_components(
            AppConfig::default(),
            Arc::new(InMemoryRemoteService::new(dataset())),
            Arc::new(InMemorySnapshotStore::new()),
        )
        .unwrap();
        assert!(!state.is_running().await);

        state.start().await.unwrap();
        assert!(state.is_running().await);
        let info = state.coordinator().get_cache_info();
        assert!(info.is_valid);
        assert_eq!(info.player_count, 4);

        state.shutdown().await.unwrap();
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_failed_warm_up_is_not_fatal() {
        let remote = Arc::new(InMemoryRemoteService::new(dataset()));
        remote.set_failure(Some("connection refused"));

        let state = AppState::with_components(
            AppConfig::default(),
            remote.clone(),
            Arc::new(InMemorySnapshotStore::new()),
        )
        .unwrap();

        state.start().await.unwrap();
        assert!(!state.coordinator().get_cache_info().has_data);

        remote.set_failure(None);
        let players = state.coordinator().get_player_stats().await.unwrap();
        assert_eq!(players.len(), 4);
        state.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_rating_config_is_rejected() {
        let mut config = AppConfig::default();
        config.rating.k_factor = 0.0;

        let result = AppState::with_components(
            config,
            Arc::new(InMemoryRemoteService::default()),
            Arc::new(InMemorySnapshotStore::new()),
        );
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }
}
