//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::LoginKitError, identity::AddressResolution, identity::NonceBinding,
    registry::BootstrapStrategy, Environment,
};

/// OAuth identity provider parameters for the implicit `id_token` flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    /// Authorization endpoint the user agent is sent to.
    pub authorize_url: String,
    /// OAuth client id registered with the provider.
    pub client_id: String,
    /// Where the provider sends the user back, with the token in the fragment.
    pub redirect_uri: String,
    /// Requested scopes.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Value of the `prompt` parameter.
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

fn default_scope() -> String {
    "openid email".to_string()
}

fn default_prompt() -> String {
    "select_account".to_string()
}

/// In-app routes the bridge navigates to once a callback has been handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routes {
    /// Unauthenticated entry point, used after any failed login.
    pub landing: String,
    /// Where the user lands after a successful login.
    pub dashboard: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            landing: "/".to_string(),
            dashboard: "/dashboard".to_string(),
        }
    }
}

/// Starter-funds behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Whether to ask the faucet for funds on login at all.
    pub enabled: bool,
    /// Faucet host, `None` on networks without one.
    pub faucet_url: Option<String>,
    /// Longest the login waits for the funding task before moving on.
    pub wait_ms: u64,
    /// Number of balance checks after the faucet request.
    pub poll_attempts: u32,
    /// Delay between balance checks.
    pub poll_interval_ms: u64,
}

impl FundingConfig {
    /// Funding switched off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            faucet_url: None,
            wait_ms: 0,
            poll_attempts: 0,
            poll_interval_ms: 0,
        }
    }

    /// How long the login waits for the funding task.
    #[must_use]
    pub const fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Delay between balance checks.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything the bridge needs to know about the ledger, the identity provider and
/// its own policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Ledger network.
    pub environment: Environment,
    /// JSON-RPC endpoint of a fullnode.
    pub rpc_url: String,
    /// Package that publishes the auth module.
    pub package_id: String,
    /// Module holding the registry entry points.
    #[serde(default = "default_module")]
    pub module: String,
    /// Shared clock object passed to time-aware calls.
    #[serde(default = "default_clock")]
    pub clock_object_id: String,
    /// Gas budget for built transactions, in the ledger's smallest unit.
    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,
    /// Identity provider parameters.
    pub identity: IdentityProviderConfig,
    /// How the session address is obtained.
    pub address: AddressResolution,
    /// How strictly the callback token is tied to the pending nonce.
    #[serde(default)]
    pub nonce_binding: NonceBinding,
    /// Registry bootstrap order.
    #[serde(default)]
    pub registry_bootstrap: BootstrapStrategy,
    /// Starter-funds behaviour.
    pub funding: FundingConfig,
    /// Post-callback routes.
    #[serde(default)]
    pub routes: Routes,
    /// Accept plain `http://` endpoints. Only meant for localnet.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

fn default_module() -> String {
    "auth".to_string()
}

fn default_clock() -> String {
    "0x6".to_string()
}

const fn default_gas_budget() -> u64 {
    10_000_000
}

impl BridgeConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// `InvalidInput` if the JSON is malformed or fails [`BridgeConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, LoginKitError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LoginKitError::InvalidInput {
                attribute: "config".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, LoginKitError> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Checks the endpoints and required identifiers.
    ///
    /// # Errors
    /// `InvalidInput` naming the first offending attribute.
    pub fn validate(&self) -> Result<(), LoginKitError> {
        self.check_endpoint("rpc_url", &self.rpc_url)?;
        self.check_endpoint("identity.authorize_url", &self.identity.authorize_url)?;
        if let Some(faucet_url) = &self.funding.faucet_url {
            self.check_endpoint("funding.faucet_url", faucet_url)?;
        }
        url::Url::parse(&self.identity.redirect_uri).map_err(|e| invalid(
            "identity.redirect_uri",
            &e.to_string(),
        ))?;
        if self.identity.client_id.trim().is_empty() {
            return Err(invalid("identity.client_id", "must not be empty"));
        }
        if self.gas_budget == 0 {
            return Err(invalid("gas_budget", "must be positive"));
        }
        for (attribute, value) in [
            ("package_id", &self.package_id),
            ("clock_object_id", &self.clock_object_id),
        ] {
            value
                .parse::<crate::LedgerAddress>()
                .map_err(|reason| invalid(attribute, &reason))?;
        }
        if !crate::transaction::is_identifier(&self.module) {
            return Err(invalid("module", "not a valid module identifier"));
        }
        Ok(())
    }

    /// Fully qualified type of the registry object, `{package}::{module}::AuthRegistry`.
    #[must_use]
    pub fn registry_type(&self) -> String {
        format!("{}::{}::AuthRegistry", self.package_id, self.module)
    }

    fn check_endpoint(&self, attribute: &str, value: &str) -> Result<(), LoginKitError> {
        let parsed = url::Url::parse(value).map_err(|e| invalid(attribute, &e.to_string()))?;
        match parsed.scheme() {
            "https" => Ok(()),
            "http" if self.allow_insecure_http => Ok(()),
            scheme => Err(invalid(
                attribute,
                &format!("scheme {scheme} not allowed, endpoints must use https"),
            )),
        }
    }
}

fn invalid(attribute: &str, reason: &str) -> LoginKitError {
    LoginKitError::InvalidInput {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    }
}
