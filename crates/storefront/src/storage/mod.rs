//! Persistent key-value storage for client state.
//!
//! Stores persist opaque string values under fixed keys, the way browser local
//! storage does. [`KeyValueStoreExt`] layers JSON on top and never fails on
//! malformed data: a value that does not parse is treated as absent so the
//! caller resets to its default.
//!
//! # Backends
//!
//! - [`MemoryStore`] - process-local, used in tests and when no data directory is configured
//! - [`FileStore`] - one file per key under a directory
//! - [`DetachedStore`] - no storage at all (server-side rendering); reads are empty and writes are dropped
//!
//! Keys are not namespaced beyond the constants in [`keys`]. Two deployments
//! sharing one store would overwrite each other's state.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::StorefrontConfig;

/// Keys under which client state is persisted.
pub mod keys {
    /// Short-lived access token.
    pub const ACCESS_TOKEN: &str = "nature_access_token";

    /// Long-lived refresh token.
    pub const REFRESH_TOKEN: &str = "nature_refresh_token";

    /// Cart line items (JSON array).
    pub const CART: &str = "nature_cart";

    /// Favorited product IDs (JSON array of integers).
    pub const FAVORITES: &str = "nature_favorites";

    /// Preferred language code.
    pub const LOCALE: &str = "nature_locale";
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized for writing.
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Key contains characters the backend cannot represent.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A writer panicked while holding the store lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// JSON helpers shared by every store consumer.
///
/// These never return errors: storage is a cache of client state, and a
/// failing or corrupt backend degrades to "empty" with a warning.
pub trait KeyValueStoreExt {
    /// Load and decode the value under `key`.
    ///
    /// Returns `None` if the key is absent, unreadable, or holds malformed JSON.
    /// Malformed values are removed so the next write starts clean.
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>;

    /// Encode and store `value` under `key`, logging on failure.
    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T);

    /// Remove `key`, logging on failure.
    fn discard(&self, key: &str);
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read persisted state");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding malformed persisted state");
                self.discard(key);
                None
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|raw| self.set(key, &raw));

        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to persist state");
        }
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.remove(key) {
            tracing::warn!(key, error = %e, "Failed to remove persisted state");
        }
    }
}

/// A store with no backing storage.
///
/// Models a rendering context where browser storage does not exist: every
/// read is empty and every write is accepted and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedStore;

impl KeyValueStore for DetachedStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Open the store selected by configuration.
///
/// Uses a [`FileStore`] under `data_dir` when configured, otherwise a fresh [`MemoryStore`].
///
/// # Errors
///
/// Returns an error if the data directory cannot be created.
pub fn open_store(config: &StorefrontConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match &config.data_dir {
        Some(dir) => Ok(Arc::new(FileStore::open(dir)?)),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}
