//! Persistence: a string key-value store and the typed gateway over it.
//!
//! Every record collection is one JSON value under a fixed key, read and
//! replaced whole. There are no partial updates and no transactions.
//! [`KeyValueStore`] is the swap point: [`MemoryStore`] for tests,
//! [`sqlite::SqliteStore`] for the CLI.

pub mod gateway;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

pub use gateway::{Gateway, Theme};
pub use sqlite::SqliteStore;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A record could not be serialized.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    /// The in-memory store's lock was poisoned.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Whole-value string storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
