//! Key-value persistence used by the session manager.
//!
//! This module provides:
//! - `KeyValueStore`: the raw string get/set/remove contract a host supplies
//! - `MemoryStore`: in-process map, handy for tests
//! - `FileStore`: one JSON file per key in a data directory
//! - `KeyringStore`: one OS keychain entry per key
//! - `Storage`: namespaced, typed JSON access on top of any backend
//!
//! Values are always stored as serialized JSON text.

pub mod file;
pub mod keychain;
pub mod memory;

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::StorageError;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

/// Raw persistence capability supplied by the host environment.
///
/// Implementations are synchronous. Concurrent writers to the same key race
/// and the last write wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Namespaced handle that (de)serializes values as JSON.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl Storage {
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Full backend key for a logical key, e.g. `token` -> `admin_token`.
    pub fn key(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.namespace, name)
        }
    }

    /// Read and deserialize `name`, returning `None` if absent.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let key = self.key(name);
        let Some(raw) = self.backend.get(&key)? else {
            debug!(key = %key, "Storage miss");
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Serialization { key, source })
    }

    /// Read and deserialize `name`, falling back to `default` if absent.
    pub fn get<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, StorageError> {
        Ok(self.get_opt(name)?.unwrap_or(default))
    }

    pub fn set<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let key = self.key(name);
        let raw = serde_json::to_string(value)
            .map_err(|source| StorageError::Serialization { key: key.clone(), source })?;
        self.backend.set(&key, &raw)
    }

    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.backend.remove(&self.key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        let backend = Arc::new(MemoryStore::new());
        let storage = Storage::new(backend.clone(), "admin");

        storage.set("token", "abc").unwrap();
        assert_eq!(storage.key("token"), "admin_token");
        assert_eq!(backend.get("admin_token").unwrap().as_deref(), Some("\"abc\""));
        assert_eq!(backend.get("token").unwrap(), None);
    }

    #[test]
    fn test_empty_namespace_uses_bare_keys() {
        let storage = Storage::new(Arc::new(MemoryStore::new()), "");
        assert_eq!(storage.key("users"), "users");
    }

    #[test]
    fn test_get_returns_default_when_absent() {
        let storage = Storage::new(Arc::new(MemoryStore::new()), "admin");
        let users: Vec<i64> = storage.get("users", Vec::new()).unwrap();
        assert!(users.is_empty());

        storage.set("users", &[1, 2, 3]).unwrap();
        let users: Vec<i64> = storage.get("users", Vec::new()).unwrap();
        assert_eq!(users, vec![1, 2, 3]);
    }

    #[test]
    fn test_corrupt_value_reports_key() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("admin_token_expiry", "not json").unwrap();
        let storage = Storage::new(backend, "admin");

        let err = storage.get_opt::<i64>("token_expiry").unwrap_err();
        assert!(matches!(err, StorageError::Serialization { ref key, .. } if key == "admin_token_expiry"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let storage = Storage::new(Arc::new(MemoryStore::new()), "admin");
        storage.set("user", &"x").unwrap();
        storage.remove("user").unwrap();
        storage.remove("user").unwrap();
        assert_eq!(storage.get_opt::<String>("user").unwrap(), None);
    }
}
