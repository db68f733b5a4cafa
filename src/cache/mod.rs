//! Snapshot cache
//!
//! This module keeps the derived ladder state in memory and in a flat
//! key-value store, and decides when it must be rebuilt from the remote store.

pub mod clock;
pub mod coordinator;
pub mod snapshot;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CacheCoordinator, PlayerHistory};
pub use snapshot::{PersistedSnapshot, Snapshot, SnapshotKeys};
pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
