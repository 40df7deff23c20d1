//! Platform interface for the durable login namespace.

use super::error::StorageResult;

/// Durable string key-value store holding the session and the pending login attempt.
///
/// On the web this maps onto `localStorage`, on mobile onto the app's preferences or
/// keychain. Every key the bridge writes lives in the same namespace, so `logout`
/// can remove all of them together.
#[uniffi::export(with_foreign)]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read(&self, key: String) -> StorageResult<Option<String>>;

    /// Replaces the value under `key`. Readers observe either the old or the new
    /// value, never a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, key: String, value: String) -> StorageResult<()>;

    /// Deletes the value under `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, key: String) -> StorageResult<()>;
}
