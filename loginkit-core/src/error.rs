use thiserror::Error;

use crate::storage::StorageError;

/// Error outputs from `LoginKit`
#[derive(Debug, Error, uniffi::Error)]
pub enum LoginKitError {
    /// The callback arrived without a pending login attempt (no `login()` before it,
    /// the nonce was already consumed, or it was cleared by a logout).
    ///
    /// Not retryable: the user must start a new login.
    #[error("missing_nonce")]
    MissingNonce,
    /// The callback fragment does not carry an `id_token`.
    #[error("missing_token")]
    MissingToken,
    /// The identity token could not be decoded where its claims are required.
    #[error("invalid_token: {reason}")]
    InvalidToken {
        /// Why the token was rejected.
        reason: String,
    },
    /// No registry object could be found for the owner after a creation attempt.
    ///
    /// Retryable by calling `ensure_registry` again.
    #[error("registry_unavailable for {owner}")]
    RegistryUnavailable {
        /// Address the registry was looked up for.
        owner: String,
    },
    /// A dry-run reported a non-success status and the caller asked to treat it as fatal.
    #[error("simulation_failed: {error}")]
    SimulationFailed {
        /// The execution error reported by the ledger.
        error: String,
    },
    /// The faucet could not fund the address. Only ever logged.
    #[error("funding_best_effort_failed: {reason}")]
    FundingBestEffortFailed {
        /// Details of the faucet failure.
        reason: String,
    },
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },
    /// Network connection error with details
    #[error("network_error: {url} (status {status:?}): {error}")]
    NetworkError {
        /// The URL that was requested
        url: String,
        /// The HTTP status code, if a response was received
        status: Option<u16>,
        /// The error message
        error: String,
    },
    /// The ledger answered a JSON-RPC call with an error object.
    #[error("rpc_error in {method} ({code}): {message}")]
    Rpc {
        /// The JSON-RPC method that failed.
        method: String,
        /// The JSON-RPC error code.
        code: i64,
        /// The message returned by the node.
        message: String,
    },
    /// Unexpected error serializing or deserializing information
    #[error("serialization_error: {error}")]
    SerializationError {
        /// The error message
        error: String,
    },
    /// The durable store failed.
    #[error("storage_error: {error}")]
    Storage {
        /// The error message
        error: String,
    },
    /// A generic error that doesn't fit any of the above categories
    #[error("unexpected_error: {error}")]
    Generic {
        /// The error message
        error: String,
    },
}

impl LoginKitError {
    /// Whether repeating the failed operation may succeed without user involvement.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistryUnavailable { .. } | Self::NetworkError { .. } | Self::Rpc { .. }
        )
    }

    /// Whether the ledger refused to build a transaction because the sender has no
    /// gas coin that covers the budget, typically an address that was never funded.
    #[must_use]
    pub fn is_gas_selection_failure(&self) -> bool {
        matches!(self, Self::Rpc { message, .. } if is_gas_selection_message(message))
    }

    /// Whether the error belongs to the identity handshake (nonce or token).
    ///
    /// These abort a login and send the user back to the entry screen.
    #[must_use]
    pub const fn is_identity_error(&self) -> bool {
        matches!(
            self,
            Self::MissingNonce | Self::MissingToken | Self::InvalidToken { .. }
        )
    }
}

/// Node messages for a move call the node could not pick gas for.
pub(crate) fn is_gas_selection_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("gas coin")
        || message.contains("gas object")
        || message.contains("insufficient gas")
        || message.contains("insufficientgas")
}

impl From<reqwest::Error> for LoginKitError {
    fn from(error: reqwest::Error) -> Self {
        Self::NetworkError {
            url: error
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: error.status().map(|s| s.as_u16()),
            error: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LoginKitError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for LoginKitError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Generic {
            error: format!("unexpected uniffi callback error: {}", error.reason),
        }
    }
}

impl From<StorageError> for LoginKitError {
    fn from(error: StorageError) -> Self {
        Self::Storage {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LoginKitError::RegistryUnavailable {
            owner: "0x1".to_string()
        }
        .is_retryable());
        assert!(!LoginKitError::MissingNonce.is_retryable());
        assert!(!LoginKitError::MissingToken.is_retryable());
        assert!(LoginKitError::MissingToken.is_identity_error());
        assert!(!LoginKitError::SimulationFailed {
            error: "InsufficientGas".to_string()
        }
        .is_identity_error());
    }

    #[test]
    fn test_gas_selection_failure() {
        let rpc = |message: &str| LoginKitError::Rpc {
            method: "unsafe_moveCall".to_string(),
            code: -32002,
            message: message.to_string(),
        };
        assert!(rpc("Cannot find gas coin for signer address 0x42dd with amount sufficient for the required gas budget 10000000").is_gas_selection_failure());
        assert!(rpc("No valid gas coins found for the transaction.").is_gas_selection_failure());
        assert!(rpc("Balance of gas object 0x5 is lower than the needed amount: 100").is_gas_selection_failure());
        assert!(!rpc("Function login_with_zk not found in module auth").is_gas_selection_failure());
        assert!(!LoginKitError::MissingNonce.is_gas_selection_failure());
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: LoginKitError = StorageError::Store("disk full".to_string()).into();
        assert!(matches!(err, LoginKitError::Storage { error } if error.contains("disk full")));
    }
}
