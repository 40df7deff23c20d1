//! Nonce/epoch registrar: the single pending-login slot.
//!
//! A login attempt is represented by a nonce and the ledger epoch current when it
//! was minted. Both live in the durable store under fixed keys, so a new attempt
//! always overwrites the previous one and a callback can consume an attempt at most
//! once.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::{
    error::LoginKitError,
    ledger::LedgerRpc,
    storage::{
        keys::{EPOCH_KEY, NONCE_KEY},
        KeyValueStore,
    },
};

/// Random bytes behind a nonce. 20 bytes encode to 27 URL-safe characters.
const NONCE_BYTES: usize = 20;

/// Single-use random value correlating an authorization request with its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginNonce(String);

impl LoginNonce {
    /// Mints a fresh nonce from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps a nonce read back from storage.
    #[must_use]
    pub const fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// The nonce as sent to the identity provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a nonce claim.
    #[must_use]
    pub fn matches(&self, claim: &str) -> bool {
        self.0.as_bytes().ct_eq(claim.as_bytes()).into()
    }
}

/// The pending login attempt: a nonce and the epoch it was minted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    /// The nonce embedded in the authorization request.
    pub nonce: LoginNonce,
    /// Ledger epoch at mint time.
    pub epoch: u64,
}

pub(crate) struct NonceRegistrar {
    store: Arc<dyn KeyValueStore>,
    ledger: Arc<dyn LedgerRpc>,
}

impl NonceRegistrar {
    pub(crate) fn new(store: Arc<dyn KeyValueStore>, ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { store, ledger }
    }

    /// Fetches the current epoch, mints a nonce and stores both, replacing any
    /// earlier attempt. Nothing is written if the epoch cannot be fetched.
    pub(crate) async fn start(&self) -> Result<PendingLogin, LoginKitError> {
        let epoch = self.ledger.latest_epoch().await?;
        let pending = PendingLogin {
            nonce: LoginNonce::generate(),
            epoch,
        };
        self.persist(&pending)?;
        log::info!("login attempt registered at epoch {epoch}");
        Ok(pending)
    }

    /// Writes the epoch first and the nonce last. The nonce is what makes an attempt
    /// pending, so a failure in between leaves no usable attempt behind.
    fn persist(&self, pending: &PendingLogin) -> Result<(), LoginKitError> {
        self.store
            .write_atomic(EPOCH_KEY.to_string(), pending.epoch.to_string())?;
        if let Err(err) = self
            .store
            .write_atomic(NONCE_KEY.to_string(), pending.nonce.as_str().to_string())
        {
            if let Err(rollback_err) = self.store.delete(EPOCH_KEY.to_string()) {
                log::error!(
                    "could not roll back {EPOCH_KEY} after failed nonce write: {rollback_err}"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Reads the pending attempt without consuming it.
    pub(crate) fn peek(&self) -> Result<Option<PendingLogin>, LoginKitError> {
        let Some(nonce) = self.store.read(NONCE_KEY.to_string())? else {
            return Ok(None);
        };
        let epoch = self
            .store
            .read(EPOCH_KEY.to_string())?
            .and_then(|raw| raw.trim().parse::<u64>().ok());
        Ok(epoch.map(|epoch| PendingLogin {
            nonce: LoginNonce::from_stored(nonce),
            epoch,
        }))
    }

    /// Consumes the pending attempt. Both keys are removed whatever they contain; an
    /// attempt whose epoch is missing or unreadable counts as absent.
    pub(crate) fn take(&self) -> Result<Option<PendingLogin>, LoginKitError> {
        let pending = self.peek()?;
        self.store.delete(NONCE_KEY.to_string())?;
        self.store.delete(EPOCH_KEY.to_string())?;
        if pending.is_none() {
            log::debug!("no pending login attempt to consume");
        }
        Ok(pending)
    }
}
