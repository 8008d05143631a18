use keyring::Entry;
use tracing::debug;

use super::KeyValueStore;
use crate::error::StorageError;

/// Stores each key as a password entry in the OS keychain.
///
/// The keychain service name groups all entries; the storage key becomes the
/// entry's user name.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(|e| keyring_error(key, e))
    }
}

fn keyring_error(key: &str, e: keyring::Error) -> StorageError {
    StorageError::Keyring {
        key: key.to_string(),
        message: e.to_string(),
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        debug!(service = %self.service, key, "Storing keychain entry");
        self.entry(key)?
            .set_password(value)
            .map_err(|e| keyring_error(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error(key, e)),
        }
    }
}
