//! `loginkit-core` turns an OAuth identity token into a session bound to a ledger
//! address.
//!
//! The [`AuthBridge`] drives the whole handshake:
//!
//! 1. [`AuthBridge::login`] fetches the current epoch, mints a nonce and redirects
//!    the user agent to the identity provider.
//! 2. [`AuthBridge::complete_login`] consumes the callback fragment, resolves the
//!    ledger address, bootstraps the on-chain registry, dry-runs the login call and
//!    persists the session.
//! 3. [`AuthBridge::logout`] removes the session together with any pending nonce.
//!
//! Transactions are only ever built and simulated here. Signing is left to the
//! wallet the host application plugs in through [`TransactionSigner`].
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Ledger network the bridge talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, uniffi::Enum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Shared development network. Resets regularly, has a faucet.
    Devnet,
    /// Public test network, has a faucet.
    Testnet,
    /// Production network.
    Mainnet,
    /// A ledger running on the developer's machine.
    Localnet,
}

mod bridge;
pub use bridge::*;

mod config;
pub use config::*;

pub mod defaults;
pub use defaults::DefaultConfig;

mod error;
pub use error::*;

pub mod funding;
pub use funding::{Faucet, FundingReport, HttpFaucet};

pub mod identity;
pub use identity::{AddressResolution, IdentityToken, NonceBinding};

pub mod ledger;
pub use ledger::{JsonRpcLedger, LedgerRpc};

pub mod logger;

mod navigation;
pub use navigation::*;

mod nonce;
pub use nonce::{LoginNonce, PendingLogin};

mod primitives;
pub use primitives::*;

mod registry;
pub use registry::{BootstrapStrategy, RegistryBootstrapper};

mod session;
pub use session::*;

pub mod storage;

mod transaction;
pub use transaction::*;

// private modules
mod http_request;

uniffi::setup_scaffolding!("loginkit_core");
