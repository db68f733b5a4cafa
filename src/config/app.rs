//! Main application configuration
//!
//! This module defines the primary configuration structures for the ladder
//! service, loaded from environment variables or a TOML file and validated
//! before use.

use crate::config::{CacheConfig, RatingConfig};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub cache: CacheConfig,
    pub remote: RemoteSettings,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP API binds to
    pub host: String,
    /// Port for the HTTP API
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Remote store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// JSON dataset served as the remote store; an empty ladder when unset
    pub dataset_path: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "doubles-ladder".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        None => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(&lookup)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_overrides(&|name: &str| env::var(name).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(host) = lookup("HTTP_HOST") {
            self.service.host = host;
        }
        if let Some(port) = parse_var("HTTP_PORT", lookup("HTTP_PORT"))? {
            self.service.http_port = port;
        }
        if let Some(timeout) =
            parse_var("SHUTDOWN_TIMEOUT_SECONDS", lookup("SHUTDOWN_TIMEOUT_SECONDS"))?
        {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Cache settings
        if let Some(ttl) = parse_var("CACHE_TTL_SECONDS", lookup("CACHE_TTL_SECONDS"))? {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(timeout) = parse_var(
            "CACHE_FETCH_TIMEOUT_SECONDS",
            lookup("CACHE_FETCH_TIMEOUT_SECONDS"),
        )? {
            self.cache.fetch_timeout_seconds = timeout;
        }
        if let Some(prefix) = lookup("CACHE_KEY_PREFIX") {
            self.cache.key_prefix = prefix;
        }
        if let Some(dir) = lookup("CACHE_DIR") {
            self.cache.store_dir = Some(PathBuf::from(dir));
        }
        if let Some(interval) = parse_var(
            "STALENESS_CHECK_INTERVAL_SECONDS",
            lookup("STALENESS_CHECK_INTERVAL_SECONDS"),
        )? {
            self.cache.staleness_check_interval_seconds = interval;
        }

        // Remote settings
        if let Some(path) = lookup("LADDER_DATASET") {
            self.remote.dataset_path = Some(PathBuf::from(path));
        }

        // Rating settings
        if let Some(initial) = parse_var("RATING_INITIAL", lookup("RATING_INITIAL"))? {
            self.rating.initial_rating = initial;
        }
        if let Some(floor) = parse_var("RATING_FLOOR", lookup("RATING_FLOOR"))? {
            self.rating.rating_floor = floor;
        }
        if let Some(k) = parse_var("RATING_K_FACTOR", lookup("RATING_K_FACTOR"))? {
            self.rating.k_factor = k;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Address the HTTP API binds to
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.host, self.service.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.host.trim().is_empty() {
        return Err(anyhow!("HTTP host cannot be empty"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    config.cache.validate()?;
    config.rating.validate()?;

    Ok(())
}
