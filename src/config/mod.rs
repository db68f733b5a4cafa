//! Configuration management for the ladder service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values.

pub mod app;
pub mod cache;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, RemoteSettings, ServiceSettings};
pub use cache::CacheConfig;
pub use rating::RatingConfig;
