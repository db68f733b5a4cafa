//! Error types for the ladder service
//!
//! This module defines the domain error taxonomy. Fallible APIs return the
//! crate-wide anyhow-based `Result`, and domain errors can be recovered from
//! it with `downcast_ref::<LadderError>()`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for ladder scenarios
///
/// The enum is `Clone` so that the outcome of a single remote refill can be
/// handed to every caller that waited on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LadderError {
    #[error("Remote fetch failed: {message}")]
    RemoteFetch { message: String },

    #[error("Data integrity problem in match {match_id}: {reason}")]
    DataIntegrity { match_id: i64, reason: String },

    #[error("Persistence failure: {message}")]
    Persistence { message: String },

    #[error("Staleness check failed: {message}")]
    StalenessCheck { message: String },

    #[error("Replay failed: {reason}")]
    ReplayFailed { reason: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: i64 },

    #[error("Invalid match preview: {reason}")]
    InvalidPreview { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl LadderError {
    /// Wrap any remote-side failure
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::RemoteFetch {
            message: err.to_string(),
        }
    }

    /// Wrap any persistent store failure
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            message: err.to_string(),
        }
    }
}
