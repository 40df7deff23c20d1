//! Registry bootstrap.
//!
//! The auth module keeps its login records in a single registry object per
//! deployment. It is created lazily by whichever client first needs it and found
//! afterwards by listing objects of the registry type owned by the address.
//! Creation and discovery are separate round-trips, so two clients may both create
//! one; when several are visible the first in ledger order wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::LoginKitError,
    ledger::LedgerRpc,
    primitives::{LedgerAddress, ObjectId},
    transaction::{ExecutionStatus, SigningRequest, TransactionBuilder, TransactionSigner},
};

/// Entry point creating the registry.
const INIT_REGISTRY: &str = "init_registry";

/// Order in which the bootstrapper creates and discovers the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStrategy {
    /// Look for an existing registry first and only create one when none is found.
    #[default]
    DiscoverThenCreate,
    /// Always attempt creation, then discover. Relies on creation being idempotent
    /// on the ledger side.
    CreateThenDiscover,
}

/// Ensures the registry exists and returns its id.
#[derive(Clone)]
pub struct RegistryBootstrapper {
    ledger: Arc<dyn LedgerRpc>,
    builder: TransactionBuilder,
    signer: Option<Arc<dyn TransactionSigner>>,
    registry_type: String,
    strategy: BootstrapStrategy,
}

impl RegistryBootstrapper {
    /// Creates a bootstrapper for registries of type `registry_type`.
    ///
    /// Without a `signer`, creation stops after the dry-run and only existing
    /// registries can be discovered.
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        builder: TransactionBuilder,
        signer: Option<Arc<dyn TransactionSigner>>,
        registry_type: String,
        strategy: BootstrapStrategy,
    ) -> Self {
        Self {
            ledger,
            builder,
            signer,
            registry_type,
            strategy,
        }
    }

    /// Returns the registry id for `owner`, creating the registry if needed.
    ///
    /// # Errors
    /// `RegistryUnavailable` when no registry is visible after the creation attempt.
    /// Network and RPC errors from discovery are returned as is.
    pub async fn ensure_registry(&self, owner: &LedgerAddress) -> Result<ObjectId, LoginKitError> {
        if self.strategy == BootstrapStrategy::DiscoverThenCreate {
            if let Some(registry) = self.discover(owner).await? {
                log::debug!("found registry {registry} for {owner}");
                return Ok(registry);
            }
        }

        if let Err(err) = self.create(owner).await {
            log::warn!("registry creation for {owner} failed: {err}");
        }

        let registry = self
            .discover(owner)
            .await?
            .ok_or_else(|| LoginKitError::RegistryUnavailable {
                owner: owner.to_string(),
            })?;
        log::info!("using registry {registry} for {owner}");
        Ok(registry)
    }

    async fn discover(&self, owner: &LedgerAddress) -> Result<Option<ObjectId>, LoginKitError> {
        let objects = self.ledger.owned_objects(owner, &self.registry_type).await?;
        if objects.len() > 1 {
            log::warn!(
                "{} registries visible for {owner}, using the first",
                objects.len()
            );
        }
        Ok(objects.first().map(|object| object.object_id))
    }

    async fn create(&self, owner: &LedgerAddress) -> Result<(), LoginKitError> {
        let transaction = self
            .builder
            .prepare(INIT_REGISTRY, vec![], &owner.to_string(), &[])?;
        let outcome = self.builder.simulate(&transaction).await?.into_result()?;

        let Some(signer) = &self.signer else {
            log::info!("no signer configured, registry creation was only simulated");
            return Ok(());
        };
        let receipt = signer
            .sign_and_execute(SigningRequest::new(&transaction, outcome.tx_bytes))
            .await?;
        match receipt.status {
            ExecutionStatus::Success => {
                log::info!("registry created in {}", receipt.digest);
                Ok(())
            }
            ExecutionStatus::Failure { error } => Err(LoginKitError::SimulationFailed { error }),
        }
    }
}
