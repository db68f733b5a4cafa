//! Remote data access
//!
//! This module defines the interface to the remote ladder store and ships an
//! in-memory implementation plus a JSON file transport.

pub mod file;
pub mod provider;

// Re-export commonly used types
pub use file::JsonFileRemoteService;
pub use provider::{InMemoryRemoteService, LadderDataset, RemoteCallCounts, RemoteDataService};
