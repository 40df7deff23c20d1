//! Ledger RPC surface consumed by the bridge.

mod json_rpc;
mod types;

pub use json_rpc::JsonRpcLedger;
pub use types::*;

use async_trait::async_trait;

use crate::{error::LoginKitError, primitives::LedgerAddress, transaction::PendingTransaction};

/// Read-only ledger access: epochs, owned objects, coins, transaction building and
/// dry-runs. Nothing here signs or commits.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Current epoch.
    async fn latest_epoch(&self) -> Result<u64, LoginKitError>;

    /// Objects owned by `owner` whose type is exactly `struct_type`, in the order the
    /// ledger returns them.
    async fn owned_objects(
        &self,
        owner: &LedgerAddress,
        struct_type: &str,
    ) -> Result<Vec<ObjectRef>, LoginKitError>;

    /// Gas coins owned by `owner`.
    async fn coins(&self, owner: &LedgerAddress) -> Result<Vec<Coin>, LoginKitError>;

    /// Builds transaction bytes (base64) for a move call, selecting gas for the sender.
    /// A sender without a usable gas coin gets an `Rpc` error naming the gas coin.
    async fn build_move_call(
        &self,
        transaction: &PendingTransaction,
    ) -> Result<String, LoginKitError>;

    /// Evaluates transaction bytes against current state without a signature.
    async fn dry_run(&self, tx_bytes: &str) -> Result<DryRunResult, LoginKitError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Ledger that only knows its epoch; everything else is empty or successful.
    pub struct StaticLedger {
        pub epoch: Option<u64>,
    }

    #[async_trait]
    impl LedgerRpc for StaticLedger {
        async fn latest_epoch(&self) -> Result<u64, LoginKitError> {
            self.epoch.ok_or_else(|| LoginKitError::NetworkError {
                url: "static".to_string(),
                status: None,
                error: "epoch unavailable".to_string(),
            })
        }

        async fn owned_objects(
            &self,
            _owner: &LedgerAddress,
            _struct_type: &str,
        ) -> Result<Vec<ObjectRef>, LoginKitError> {
            Ok(vec![])
        }

        async fn coins(&self, _owner: &LedgerAddress) -> Result<Vec<Coin>, LoginKitError> {
            Ok(vec![])
        }

        async fn build_move_call(
            &self,
            _transaction: &PendingTransaction,
        ) -> Result<String, LoginKitError> {
            Ok("AAAA".to_string())
        }

        async fn dry_run(&self, _tx_bytes: &str) -> Result<DryRunResult, LoginKitError> {
            Ok(DryRunResult {
                status: crate::ExecutionStatus::Success,
                gas: crate::GasSummary::default(),
                event_count: 0,
            })
        }
    }
}
