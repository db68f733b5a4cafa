//! Snapshot cache configuration

use crate::error::LadderError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted ttl: ten years
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for the snapshot cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a snapshot stays valid, in seconds
    pub ttl_seconds: u64,
    /// Bound on a single remote fetch or probe, in seconds (0 = unbounded)
    pub fetch_timeout_seconds: u64,
    /// Prefix of every persisted key
    pub key_prefix: String,
    /// Directory for the file-backed store; in-memory when unset
    pub store_dir: Option<PathBuf>,
    /// Background staleness probe interval, in seconds (0 = disabled)
    pub staleness_check_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 1800, // 30 minutes
            fetch_timeout_seconds: 30,
            key_prefix: "ladder_cache".to_string(),
            store_dir: None,
            staleness_check_interval_seconds: 300, // 5 minutes
        }
    }
}

impl CacheConfig {
    /// Snapshot lifetime, saturating at `chrono::Duration::MAX`
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        match self.fetch_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn staleness_check_interval(&self) -> Option<Duration> {
        match self.staleness_check_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate the cache configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ttl_seconds == 0 {
            return Err(LadderError::ConfigurationError {
                message: "Cache ttl must be greater than 0".to_string(),
            }
            .into());
        }
        if self.ttl_seconds > MAX_TTL_SECONDS {
            return Err(LadderError::ConfigurationError {
                message: format!(
                    "Cache ttl of {}s exceeds the maximum of {}s",
                    self.ttl_seconds, MAX_TTL_SECONDS
                ),
            }
            .into());
        }
        if self.key_prefix.trim().is_empty() {
            return Err(LadderError::ConfigurationError {
                message: "Cache key prefix cannot be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
