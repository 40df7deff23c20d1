use std::sync::Arc;

use crate::{
    config::BridgeConfig,
    defaults::DefaultConfig,
    error::LoginKitError,
    funding::{Faucet, FundingAssist, HttpFaucet},
    identity::{self, CallbackParams},
    ledger::{JsonRpcLedger, LedgerRpc},
    logger::redact,
    navigation::Navigator,
    nonce::NonceRegistrar,
    primitives::{LedgerAddress, ParseFromForeignBinding},
    registry::RegistryBootstrapper,
    session::{Session, SessionStore},
    storage::KeyValueStore,
    transaction::{CallArg, SimulationOutcome, TransactionBuilder, TransactionSigner},
    Environment,
};

/// Entry point recording a login in the registry.
const LOGIN_WITH_ZK: &str = "login_with_zk";

/// Result of a completed login.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct LoginOutcome {
    /// The session now persisted.
    pub session: Session,
    /// Registry the login was recorded against.
    pub registry_id: String,
    /// Dry-run of the login call, ready to be signed by the wallet.
    pub simulation: SimulationOutcome,
}

/// Drives the login handshake and owns the process-wide session.
///
/// One instance per application. Calls are expected one at a time: a second
/// `login` replaces the pending attempt of the first.
#[derive(uniffi::Object)]
pub struct AuthBridge {
    config: BridgeConfig,
    navigator: Arc<dyn Navigator>,
    nonces: NonceRegistrar,
    sessions: SessionStore,
    builder: TransactionBuilder,
    registry: RegistryBootstrapper,
    funding: FundingAssist,
}

#[uniffi::export(async_runtime = "tokio")]
impl AuthBridge {
    /// Creates a bridge from a JSON configuration, talking to the configured fullnode
    /// and faucet. `signer` is the wallet used to create the registry when none
    /// exists yet; without one, registry creation is only simulated.
    ///
    /// # Errors
    /// `InvalidInput` if the configuration is malformed.
    #[uniffi::constructor]
    pub fn new(
        config: &str,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self, LoginKitError> {
        let config = BridgeConfig::from_json(config)?;
        Self::with_config(config, store, navigator, signer)
    }

    /// Creates a bridge with the defaults of `environment`.
    ///
    /// # Errors
    /// `InvalidInput` if the OAuth client parameters are malformed.
    #[uniffi::constructor]
    pub fn from_environment(
        environment: Environment,
        client_id: &str,
        redirect_uri: &str,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self, LoginKitError> {
        let config = BridgeConfig::from_environment(environment, client_id, redirect_uri)?;
        Self::with_config(config, store, navigator, signer)
    }

    /// Starts a login: registers a fresh nonce against the current epoch and sends
    /// the user agent to the identity provider. Any earlier pending attempt is
    /// replaced.
    ///
    /// Returns the authorization URL it navigated to.
    ///
    /// # Errors
    /// Network or RPC errors fetching the epoch, in which case nothing is stored.
    pub async fn login(&self) -> Result<String, LoginKitError> {
        let pending = self.nonces.start().await?;
        let url = identity::authorization_url(&self.config.identity, &pending.nonce)?;
        self.navigator.navigate(url.clone());
        Ok(url)
    }

    /// Handles the provider callback.
    ///
    /// On success the session is persisted and the user agent is sent to the
    /// dashboard. On any failure the bridge is left logged out, the user agent is
    /// sent to the landing route and the error is returned. The pending attempt is
    /// consumed either way, so replaying a callback fails with `MissingNonce`.
    ///
    /// # Errors
    /// - `MissingToken` if the fragment has no `id_token`.
    /// - `MissingNonce` if there is no pending attempt, or the token belongs to
    ///   another one.
    /// - `InvalidToken`, `RegistryUnavailable`, network and RPC errors from the
    ///   later steps.
    pub async fn complete_login(
        &self,
        callback_fragment: &str,
    ) -> Result<LoginOutcome, LoginKitError> {
        match self.exchange(callback_fragment).await {
            Ok(outcome) => {
                self.navigator.navigate(self.config.routes.dashboard.clone());
                Ok(outcome)
            }
            Err(err) => {
                log::warn!("login aborted: {err}");
                if let Err(clear_err) = self.sessions.clear() {
                    log::error!("could not tear down session after failed login: {clear_err}");
                }
                self.navigator.navigate(self.config.routes.landing.clone());
                Err(err)
            }
        }
    }

    /// Logs out, removing the session and any pending login attempt, and returns
    /// the user agent to the landing route.
    ///
    /// # Errors
    /// `Storage` if a key could not be removed. The in-memory session is logged out
    /// regardless.
    pub fn logout(&self) -> Result<(), LoginKitError> {
        let cleared = self.sessions.clear();
        self.navigator.navigate(self.config.routes.landing.clone());
        log::info!("logged out");
        cleared
    }

    /// The current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.sessions.current()
    }

    /// Re-reads the session from the durable store.
    #[must_use]
    pub fn reload_session(&self) -> Session {
        self.sessions.load()
    }

    /// Makes sure the registry exists and returns its id. Safe to call repeatedly.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed address, `RegistryUnavailable` if no registry
    /// is visible after creation.
    pub async fn ensure_registry(&self, address: &str) -> Result<String, LoginKitError> {
        let address = LedgerAddress::parse_from_ffi(address, "address")?;
        let registry = self.registry.ensure_registry(&address).await?;
        Ok(registry.to_string())
    }

    /// Builds a move call with an explicit sender and dry-runs it.
    ///
    /// `entry_point` is a function of the configured module or a fully qualified
    /// `package::module::function`. Every object argument must be listed in
    /// `referenced_objects`. A failing dry-run is returned, not raised.
    ///
    /// # Errors
    /// `InvalidInput` for malformed arguments, network or RPC errors.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn build_and_simulate(
        &self,
        entry_point: &str,
        args: Vec<CallArg>,
        sender: &str,
        referenced_objects: Vec<String>,
    ) -> Result<SimulationOutcome, LoginKitError> {
        self.builder
            .build_and_simulate(entry_point, args, sender, &referenced_objects)
            .await
    }
}

impl AuthBridge {
    /// Creates a bridge for `config` with the JSON-RPC ledger client and, where the
    /// network has one, the HTTP faucet.
    ///
    /// # Errors
    /// `InvalidInput` if the configuration does not validate.
    pub fn with_config(
        config: BridgeConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self, LoginKitError> {
        let ledger: Arc<dyn LedgerRpc> = Arc::new(JsonRpcLedger::new(&config.rpc_url));
        let faucet = config
            .funding
            .faucet_url
            .as_deref()
            .map(|url| Arc::new(HttpFaucet::new(url)) as Arc<dyn Faucet>);
        Self::with_collaborators(config, store, navigator, ledger, faucet, signer)
    }

    /// Creates a bridge with explicit collaborators. `signer` is only used to create
    /// the registry when none exists yet.
    ///
    /// # Errors
    /// `InvalidInput` if the configuration does not validate.
    pub fn with_collaborators(
        config: BridgeConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        ledger: Arc<dyn LedgerRpc>,
        faucet: Option<Arc<dyn Faucet>>,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self, LoginKitError> {
        config.validate()?;
        let builder = TransactionBuilder::new(
            ledger.clone(),
            &config.package_id,
            &config.module,
            config.gas_budget,
        )?;
        let registry = RegistryBootstrapper::new(
            ledger.clone(),
            builder.clone(),
            signer,
            config.registry_type(),
            config.registry_bootstrap,
        );
        let funding = FundingAssist::new(faucet, ledger.clone(), config.funding.clone());
        let sessions = SessionStore::init(store.clone());
        log::debug!(
            "bridge ready on {:?}, session authenticated: {}",
            config.environment,
            sessions.current().is_authenticated
        );

        Ok(Self {
            nonces: NonceRegistrar::new(store, ledger),
            sessions,
            builder,
            registry,
            funding,
            navigator,
            config,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    async fn exchange(&self, callback_fragment: &str) -> Result<LoginOutcome, LoginKitError> {
        let token = CallbackParams::parse(callback_fragment).into_token();
        let pending = self.nonces.take()?;
        let token = token?;
        let pending = pending.ok_or(LoginKitError::MissingNonce)?;

        self.config.nonce_binding.check(&token, &pending)?;
        let address = self.config.address.resolve(&token)?;
        log::info!(
            "token {} resolved to {address} (epoch {})",
            redact(token.expose()),
            pending.epoch
        );

        if let Some(funding) = self.funding.spawn(address) {
            if let Some(report) = funding.wait().await {
                log::info!("starter funds for {address}: {report:?}");
            }
        }

        let registry = self.registry.ensure_registry(&address).await?.to_string();
        let clock = self.config.clock_object_id.clone();
        let simulation = self
            .builder
            .build_and_simulate(
                LOGIN_WITH_ZK,
                vec![
                    CallArg::object(registry.clone()),
                    CallArg::string(token.expose()),
                    CallArg::u64(pending.epoch),
                    CallArg::object(clock.clone()),
                ],
                &address.to_string(),
                &[registry.clone(), clock],
            )
            .await?;

        let session = self.sessions.persist(&address)?;
        Ok(LoginOutcome {
            session,
            registry_id: registry,
            simulation,
        })
    }
}
