#![allow(dead_code, missing_docs)]

//! In-process collaborators shared across integration tests.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use loginkit_core::{
    ledger::{Coin, DryRunResult, ObjectRef},
    storage::MemoryStore,
    AuthBridge, BridgeConfig, DefaultConfig, Environment, ExecutionReceipt, ExecutionStatus,
    Faucet, GasSummary, LedgerAddress, LedgerRpc, LoginKitError, Navigator, ObjectId,
    PendingTransaction, SigningRequest, TransactionSigner,
};

pub const REDIRECT_URI: &str = "https://app.example.com/auth/callback";
pub const REGISTRY_ID: &str = "0x00000000000000000000000000000000000000000000000000000000000a11ce";

/// Ledger kept in memory. Registries appear when [`CreatingSigner`] executes.
pub struct FakeLedger {
    pub epoch: AtomicU64,
    pub registries: Mutex<Vec<ObjectId>>,
    pub built: Mutex<Vec<PendingTransaction>>,
    pub dry_run_error: Mutex<Option<String>>,
}

impl FakeLedger {
    pub fn new(epoch: u64) -> Arc<Self> {
        Arc::new(Self {
            epoch: AtomicU64::new(epoch),
            registries: Mutex::new(vec![]),
            built: Mutex::new(vec![]),
            dry_run_error: Mutex::new(None),
        })
    }

    pub fn built_functions(&self) -> Vec<String> {
        self.built
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.target.function.clone())
            .collect()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn latest_epoch(&self) -> Result<u64, LoginKitError> {
        Ok(self.epoch.load(Ordering::SeqCst))
    }

    async fn owned_objects(
        &self,
        _owner: &LedgerAddress,
        struct_type: &str,
    ) -> Result<Vec<ObjectRef>, LoginKitError> {
        assert!(struct_type.ends_with("::auth::AuthRegistry"));
        Ok(self
            .registries
            .lock()
            .unwrap()
            .iter()
            .map(|id| ObjectRef {
                object_id: *id,
                version: 1,
                digest: "digest".to_string(),
            })
            .collect())
    }

    async fn coins(&self, owner: &LedgerAddress) -> Result<Vec<Coin>, LoginKitError> {
        Ok(vec![Coin {
            object_id: *owner,
            balance: 1_000_000_000,
        }])
    }

    async fn build_move_call(
        &self,
        transaction: &PendingTransaction,
    ) -> Result<String, LoginKitError> {
        self.built.lock().unwrap().push(transaction.clone());
        Ok("AAEC".to_string())
    }

    async fn dry_run(&self, _tx_bytes: &str) -> Result<DryRunResult, LoginKitError> {
        let status = self
            .dry_run_error
            .lock()
            .unwrap()
            .clone()
            .map_or(ExecutionStatus::Success, |error| ExecutionStatus::Failure {
                error,
            });
        Ok(DryRunResult {
            status,
            gas: GasSummary {
                computation_cost: 1_000,
                storage_cost: 2_000,
                storage_rebate: 500,
            },
            event_count: 1,
        })
    }
}

/// Wallet that "executes" `init_registry` by adding a registry to the ledger.
pub struct CreatingSigner {
    pub ledger: Arc<FakeLedger>,
    pub executions: AtomicUsize,
}

impl CreatingSigner {
    pub fn new(ledger: Arc<FakeLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            executions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TransactionSigner for CreatingSigner {
    async fn sign_and_execute(
        &self,
        request: SigningRequest,
    ) -> Result<ExecutionReceipt, LoginKitError> {
        assert!(request.target.ends_with("::auth::init_registry"));
        assert_eq!(request.tx_bytes, "AAEC");
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.ledger
            .registries
            .lock()
            .unwrap()
            .push(ObjectId::from_str(REGISTRY_ID).unwrap());
        Ok(ExecutionReceipt {
            digest: "5xkZ".to_string(),
            status: ExecutionStatus::Success,
        })
    }
}

/// Faucet that is always unreachable.
pub struct FailingFaucet {
    pub calls: AtomicUsize,
}

impl FailingFaucet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Faucet for FailingFaucet {
    async fn request_funds(&self, _recipient: &LedgerAddress) -> Result<(), LoginKitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LoginKitError::NetworkError {
            url: "https://faucet.devnet.sui.io/gas".to_string(),
            status: None,
            error: "connection refused".to_string(),
        })
    }
}

/// Records every navigation.
#[derive(Default)]
pub struct RecordingNavigator {
    pub visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn last(&self) -> Option<String> {
        self.visited.lock().unwrap().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: String) {
        self.visited.lock().unwrap().push(url);
    }
}

/// Everything a test needs to drive and inspect a bridge.
pub struct Harness {
    pub bridge: AuthBridge,
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub signer: Arc<CreatingSigner>,
    pub faucet: Arc<FailingFaucet>,
}

pub fn devnet_config() -> BridgeConfig {
    let mut config =
        BridgeConfig::from_environment(Environment::Devnet, "client-123", REDIRECT_URI).unwrap();
    config.funding.wait_ms = 500;
    config.funding.poll_interval_ms = 5;
    config
}

pub fn harness() -> Harness {
    harness_with(devnet_config())
}

pub fn harness_with(config: BridgeConfig) -> Harness {
    let ledger = FakeLedger::new(42);
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(RecordingNavigator::default());
    let signer = CreatingSigner::new(ledger.clone());
    let faucet = FailingFaucet::new();
    let bridge = AuthBridge::with_collaborators(
        config,
        store.clone(),
        navigator.clone(),
        ledger.clone(),
        Some(faucet.clone() as Arc<dyn Faucet>),
        Some(signer.clone() as Arc<dyn TransactionSigner>),
    )
    .unwrap();
    Harness {
        bridge,
        ledger,
        store,
        navigator,
        signer,
        faucet,
    }
}

/// Nonce embedded in an authorization URL.
pub fn nonce_of(authorization_url: &str) -> String {
    url::Url::parse(authorization_url)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "nonce")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

/// Unsigned JWT whose payload carries `nonce`.
pub fn token_for(nonce: &str, sub: &str) -> String {
    jwt(&serde_json::json!({
        "iss": "https://accounts.google.com",
        "aud": "client-123",
        "sub": sub,
        "nonce": nonce,
        "exp": 4_102_444_800u64,
    }))
}

/// Unsigned JWT with an arbitrary payload.
pub fn jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"test","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn fragment_for(token: &str) -> String {
    format!("#id_token={token}&authuser=0&prompt=consent")
}
