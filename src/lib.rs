//! Doubles Ladder - rating service for doubles competitions
//!
//! This crate rebuilds player ratings from the full match log with a
//! deterministic doubles rating formula, and keeps the derived state in a
//! snapshot cache that stays coherent with a remote data store.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod remote;
pub mod service;
pub mod types;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use cache::{CacheCoordinator, Snapshot, SnapshotStore};
pub use rating::{DoublesRatingEngine, HistoryReplayer};
pub use remote::RemoteDataService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
