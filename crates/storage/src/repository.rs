use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Storage key holding the serialized session snapshot.
pub const SNAPSHOT_KEY: &str = "quiz.session.snapshot";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Single-slot raw storage for the serialized session snapshot.
///
/// Implementations only move strings; validation belongs to the codec. Callers
/// treat every error as "nothing stored" so a broken backend degrades to a
/// session without local resume.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the raw slot contents, `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn read_raw(&self) -> Result<Option<String>, StorageError>;

    /// Replace the slot contents.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn write_raw(&self, raw: &str) -> Result<(), StorageError>;

    /// Remove the slot contents. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear_raw(&self) -> Result<(), StorageError>;
}

/// Simple in-memory key-value store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed a raw value directly, bypassing the codec.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_raw(&self, key: &str, raw: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), raw.into());
        Ok(())
    }

    /// Read a raw value by key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryRepository {
    async fn read_raw(&self) -> Result<Option<String>, StorageError> {
        self.get_raw(SNAPSHOT_KEY)
    }

    async fn write_raw(&self, raw: &str) -> Result<(), StorageError> {
        self.put_raw(SNAPSHOT_KEY, raw)
    }

    async fn clear_raw(&self) -> Result<(), StorageError> {
        let mut guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(SNAPSHOT_KEY);
        Ok(())
    }
}

/// Store used when no persistence is available: reads nothing, drops writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSnapshotStore;

#[async_trait]
impl SnapshotStore for NoopSnapshotStore {
    async fn read_raw(&self) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn write_raw(&self, _raw: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn clear_raw(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Aggregates the snapshot slot behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl Storage {
    #[must_use]
    pub fn noop() -> Self {
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(NoopSnapshotStore);
        Self { snapshots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_slot_round_trips_and_clears() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.read_raw().await.unwrap(), None);

        repo.write_raw("first").await.unwrap();
        repo.write_raw("second").await.unwrap();
        assert_eq!(repo.read_raw().await.unwrap().as_deref(), Some("second"));

        repo.clear_raw().await.unwrap();
        assert_eq!(repo.read_raw().await.unwrap(), None);
        repo.clear_raw().await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_the_same_slot() {
        let repo = InMemoryRepository::new();
        let other = repo.clone();
        repo.write_raw("shared").await.unwrap();
        assert_eq!(other.read_raw().await.unwrap().as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn noop_store_never_returns_data() {
        let storage = Storage::noop();
        storage.snapshots.write_raw("ignored").await.unwrap();
        assert_eq!(storage.snapshots.read_raw().await.unwrap(), None);
    }
}
