//! Health checks
//!
//! This module derives the service health from the running flag and the
//! state of the snapshot cache.

use crate::service::app::AppState;
use crate::types::CacheInfo;
use serde::{Deserialize, Serialize};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Snapshot cache state at check time
    pub cache: CacheInfo,
}

impl HealthCheck {
    /// Check the service
    ///
    /// Unhealthy when stopped. Degraded while no valid snapshot is held or
    /// the persistent store is failing, since reads then hit the remote
    /// store or lose their restart cache.
    pub async fn check(app_state: &AppState) -> Self {
        let cache = app_state.coordinator().get_cache_info();
        let status = Self::status_for(app_state.is_running().await, &cache);

        HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            cache,
        }
    }

    pub fn status_for(running: bool, cache: &CacheInfo) -> HealthStatus {
        if !running {
            HealthStatus::Unhealthy
        } else if !cache.is_valid || cache.persistence_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_info(is_valid: bool, persistence_degraded: bool) -> CacheInfo {
        CacheInfo {
            has_data: is_valid,
            is_valid,
            last_updated: None,
            is_loading: false,
            latest_match: None,
            player_count: 0,
            match_count: 0,
            skipped_matches: 0,
            persistence_degraded,
        }
    }

    #[test]
    fn test_status_rules() {
        assert_eq!(
            HealthCheck::status_for(true, &cache_info(true, false)),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthCheck::status_for(true, &cache_info(false, false)),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthCheck::status_for(true, &cache_info(true, true)),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthCheck::status_for(false, &cache_info(true, false)),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
    }
}
