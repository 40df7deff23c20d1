//! Ready-made configurations for the supported environments.

use crate::{
    config::{BridgeConfig, FundingConfig, IdentityProviderConfig, Routes},
    error::LoginKitError,
    identity::{AddressResolution, NonceBinding},
    registry::BootstrapStrategy,
    Environment,
};

/// Package publishing the `auth` module.
pub static AUTH_PACKAGE_ID: &str =
    "0x83fb80f87901b93ceef7d5a3180a1aa48254c88a9f7b14eb2bf74a8c2f94e701";

/// Address every devnet session is bound to while address derivation from proofs is
/// not wired up on the ledger side.
pub static DEVNET_TEST_ADDRESS: &str =
    "0x42dd208590e5958a16488cbc771dd324a4a5b0cd34eafaaf28e4ad351d36684f";

/// Google's OAuth 2.0 authorization endpoint.
pub static GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Builds a configuration from network defaults.
pub trait DefaultConfig {
    /// Returns the defaults for `environment`, with the caller's OAuth client.
    ///
    /// # Errors
    /// Returns an error if the resulting configuration does not validate.
    fn from_environment(
        environment: Environment,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<Self, LoginKitError>
    where
        Self: Sized;
}

impl DefaultConfig for BridgeConfig {
    fn from_environment(
        environment: Environment,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<Self, LoginKitError> {
        let (rpc_url, faucet_url) = match environment {
            Environment::Devnet => (
                "https://fullnode.devnet.sui.io:443",
                Some("https://faucet.devnet.sui.io"),
            ),
            Environment::Testnet => (
                "https://fullnode.testnet.sui.io:443",
                Some("https://faucet.testnet.sui.io"),
            ),
            Environment::Mainnet => ("https://fullnode.mainnet.sui.io:443", None),
            Environment::Localnet => ("http://127.0.0.1:9000", Some("http://127.0.0.1:9123")),
        };

        let address = match environment {
            Environment::Devnet | Environment::Localnet => AddressResolution::TestIdentity {
                address: DEVNET_TEST_ADDRESS.to_string(),
            },
            Environment::Testnet | Environment::Mainnet => AddressResolution::Derived {
                salt: String::new(),
            },
        };

        let funding = faucet_url.map_or_else(FundingConfig::disabled, |faucet_url| {
            FundingConfig {
                enabled: true,
                faucet_url: Some(faucet_url.to_string()),
                wait_ms: 5_000,
                poll_attempts: 3,
                poll_interval_ms: 1_000,
            }
        });

        let config = Self {
            environment,
            rpc_url: rpc_url.to_string(),
            package_id: AUTH_PACKAGE_ID.to_string(),
            module: "auth".to_string(),
            clock_object_id: "0x6".to_string(),
            gas_budget: 10_000_000,
            identity: IdentityProviderConfig {
                authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                scope: "openid email".to_string(),
                prompt: "select_account".to_string(),
            },
            address,
            nonce_binding: NonceBinding::default(),
            registry_bootstrap: BootstrapStrategy::default(),
            funding,
            routes: Routes::default(),
            allow_insecure_http: environment == Environment::Localnet,
        };
        config.validate()?;
        Ok(config)
    }
}
