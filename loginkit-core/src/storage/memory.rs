//! In-memory key-value store.
//!
//! Used by tests and by hosts that deliberately do not want sessions to survive a
//! restart.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{KeyValueStore, StorageError, StorageResult};

/// A [`KeyValueStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the store holds no keys at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Store("mutex poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: String) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    fn write_atomic(&self, key: String, value: String) -> StorageResult<()> {
        self.lock()?.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: String) -> StorageResult<()> {
        self.lock()?.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_delete() {
        let store = MemoryStore::new();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.read("a".to_string()).unwrap(), None);

        store.write_atomic("a".to_string(), "1".to_string()).unwrap();
        store.write_atomic("a".to_string(), "2".to_string()).unwrap();
        assert_eq!(store.read("a".to_string()).unwrap().as_deref(), Some("2"));
        assert_eq!(store.len().unwrap(), 1);

        store.delete("a".to_string()).unwrap();
        store.delete("a".to_string()).unwrap();
        assert!(store.is_empty().unwrap());
    }
}
