//! Snapshot store interface and implementations
//!
//! A flat string key-value store is all the coordinator needs. Failures are
//! reported as `LadderError::Persistence`; the coordinator absorbs them.

use crate::error::LadderError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Trait for the persistent snapshot store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> crate::error::Result<Option<String>>;

    /// Store or overwrite a value
    async fn set(&self, key: &str, value: &str) -> crate::error::Result<()>;

    /// Remove a value; removing an absent key is not an error
    async fn remove(&self, key: &str) -> crate::error::Result<()>;
}

/// In-memory snapshot store
///
/// Survives only as long as the process; useful for tests and when no store
/// directory is configured. Can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    entries: RwLock<HashMap<String, String>>,
    failure: RwLock<Option<String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `message`, or recover with `None`
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = message.map(str::to_string);
        }
    }

    /// Stored keys, sorted (for testing)
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn check_available(&self) -> crate::error::Result<()> {
        match self.failure.read().ok().and_then(|f| f.clone()) {
            Some(message) => Err(LadderError::persistence(message).into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
        self.check_available()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> crate::error::Result<()> {
        self.check_available()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> crate::error::Result<()> {
        self.check_available()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;
        entries.remove(key);
        Ok(())
    }
}

/// Snapshot store keeping one file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LadderError::persistence(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> crate::error::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            LadderError::persistence(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        // Write-then-rename so readers never see half a value
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, value).await.map_err(|e| {
            LadderError::persistence(format!("cannot write {}: {}", staging.display(), e))
        })?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| {
            LadderError::persistence(format!("cannot replace {}: {}", path.display(), e))
        })?;

        debug!("Persisted {} bytes under {}", value.len(), key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> crate::error::Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LadderError::persistence(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_operations() {
        let store = InMemorySnapshotStore::new();
        assert_eq!(store.get("ladder_cache:players").await.unwrap(), None);

        store.set("ladder_cache:players", "[]").await.unwrap();
        store.set("ladder_cache:matches", "[]").await.unwrap();
        assert_eq!(
            store.get("ladder_cache:players").await.unwrap().as_deref(),
            Some("[]")
        );
        assert_eq!(
            store.keys(),
            vec!["ladder_cache:matches", "ladder_cache:players"]
        );

        store.remove("ladder_cache:players").await.unwrap();
        store.remove("ladder_cache:players").await.unwrap();
        assert_eq!(store.keys(), vec!["ladder_cache:matches"]);
    }

    #[tokio::test]
    async fn test_in_memory_store_failure_mode() {
        let store = InMemorySnapshotStore::new();
        store.set_failure(Some("quota exceeded"));

        let err = store.set("k", "v").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::Persistence { .. })
        ));

        store.set_failure(None);
        tokio_test::assert_ok!(store.set("k", "v").await);
    }

    #[tokio::test]
    async fn test_file_store_round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("cache"));

        assert_eq!(store.get("ladder_cache:timestamp").await.unwrap(), None);
        store
            .set("ladder_cache:timestamp", "2024-03-03T18:00:00+00:00")
            .await
            .unwrap();
        assert_eq!(
            store.get("ladder_cache:timestamp").await.unwrap().as_deref(),
            Some("2024-03-03T18:00:00+00:00")
        );
        assert!(dir
            .path()
            .join("cache")
            .join("ladder_cache_timestamp.json")
            .exists());

        store.remove("ladder_cache:timestamp").await.unwrap();
        store.remove("ladder_cache:timestamp").await.unwrap();
        assert_eq!(store.get("ladder_cache:timestamp").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        tokio::fs::write(&blocker, "file").await.unwrap();

        let store = FileSnapshotStore::new(&blocker);
        let err = store.set("k", "v").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::Persistence { .. })
        ));
    }
}
