//! Error types for the durable login namespace.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by key-value store implementations.
#[derive(Debug, Error, uniffi::Error)]
pub enum StorageError {
    /// Errors coming from the backing store (filesystem, browser storage, keychain).
    #[error("store error: {0}")]
    Store(String),

    /// The key is not usable by the store.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for StorageError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Store(error.to_string())
    }
}
