//! Best-effort starter funds.
//!
//! On login the bridge asks a faucet to send gas to the session address, then polls
//! briefly until coins show up. This runs as a detached task; whatever happens is
//! logged and never reaches the login's error channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::{
    config::FundingConfig, error::LoginKitError, http_request::Request, ledger::LedgerRpc,
    primitives::LedgerAddress,
};

/// A service that sends free gas to an address.
#[async_trait]
pub trait Faucet: Send + Sync {
    /// Requests funds for `recipient`. Returning `Ok` means the request was accepted,
    /// not that the funds have arrived.
    ///
    /// # Errors
    /// Network failures, or the faucet refusing the request.
    async fn request_funds(&self, recipient: &LedgerAddress) -> Result<(), LoginKitError>;
}

/// The ledger's public faucet, `POST {host}/gas`.
#[derive(Debug)]
pub struct HttpFaucet {
    host: String,
    request: Request,
}

impl HttpFaucet {
    /// Creates a client for the faucet at `host`.
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            request: Request::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaucetResponse {
    #[serde(default)]
    transferred_gas_objects: Vec<Value>,
    error: Option<String>,
}

#[async_trait]
impl Faucet for HttpFaucet {
    async fn request_funds(&self, recipient: &LedgerAddress) -> Result<(), LoginKitError> {
        let url = format!("{}/gas", self.host);
        let body = json!({ "FixedAmountRequest": { "recipient": recipient.to_string() } });
        let response = self
            .request
            .handle(self.request.post(&url).json(&body))
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LoginKitError::FundingBestEffortFailed {
                reason: format!("faucet answered {status}: {text}"),
            });
        }

        let parsed: FaucetResponse = serde_json::from_str(&text)?;
        if let Some(error) = parsed.error {
            return Err(LoginKitError::FundingBestEffortFailed { reason: error });
        }
        log::debug!(
            "faucet sent {} gas objects to {recipient}",
            parsed.transferred_gas_objects.len()
        );
        Ok(())
    }
}

/// How a funding attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingReport {
    /// Coins are visible for the address.
    Funded {
        /// Number of coins.
        coins: usize,
        /// Their total balance.
        balance: u64,
    },
    /// The faucet accepted the request but no coins showed up while polling.
    Pending,
    /// The faucet could not be used. The address may already be funded.
    Failed {
        /// What went wrong.
        reason: String,
    },
    /// Funding is switched off or the network has no faucet.
    Skipped,
}

/// Requests starter funds and waits a bounded time for them.
#[derive(Clone)]
pub struct FundingAssist {
    faucet: Option<Arc<dyn Faucet>>,
    ledger: Arc<dyn LedgerRpc>,
    config: FundingConfig,
}

impl FundingAssist {
    /// Creates the assist. `faucet` is `None` on networks without one.
    pub fn new(
        faucet: Option<Arc<dyn Faucet>>,
        ledger: Arc<dyn LedgerRpc>,
        config: FundingConfig,
    ) -> Self {
        Self {
            faucet,
            ledger,
            config,
        }
    }

    /// Asks the faucet for funds, then polls the address's coins. Never fails;
    /// problems are reported as [`FundingReport::Failed`].
    pub async fn request_starter_funds(&self, address: &LedgerAddress) -> FundingReport {
        let Some(faucet) = self.faucet.as_ref().filter(|_| self.config.enabled) else {
            return FundingReport::Skipped;
        };

        if let Err(err) = faucet.request_funds(address).await {
            let err = match err {
                LoginKitError::FundingBestEffortFailed { .. } => err,
                other => LoginKitError::FundingBestEffortFailed {
                    reason: other.to_string(),
                },
            };
            log::warn!("starter funds for {address}: {err}");
            return FundingReport::Failed {
                reason: err.to_string(),
            };
        }

        if self.config.poll_attempts == 0 {
            return FundingReport::Pending;
        }
        tokio::time::sleep(self.config.poll_interval()).await;

        let backoff = ConstantBuilder::default()
            .with_delay(self.config.poll_interval())
            .with_max_times((self.config.poll_attempts - 1) as usize);
        let polled = (|| async { self.funded_balance(address).await })
            .retry(backoff)
            .await;

        match polled {
            Ok((coins, balance)) => {
                log::info!("{address} holds {coins} coins ({balance})");
                FundingReport::Funded { coins, balance }
            }
            Err(err) => {
                log::info!("no coins visible for {address} yet: {err}");
                FundingReport::Pending
            }
        }
    }

    async fn funded_balance(&self, address: &LedgerAddress) -> Result<(usize, u64), LoginKitError> {
        let coins = self.ledger.coins(address).await?;
        if coins.is_empty() {
            return Err(LoginKitError::Generic {
                error: "no coins yet".to_string(),
            });
        }
        let balance = coins
            .iter()
            .fold(0u64, |total, coin| total.saturating_add(coin.balance));
        Ok((coins.len(), balance))
    }

    /// Starts funding as a detached task. Returns `None` when funding is skipped.
    pub fn spawn(&self, address: LedgerAddress) -> Option<FundingHandle> {
        if !self.config.enabled || self.faucet.is_none() {
            return None;
        }
        let assist = self.clone();
        let task = tokio::spawn(async move { assist.request_starter_funds(&address).await });
        Some(FundingHandle {
            task,
            wait: self.config.wait(),
        })
    }
}

/// A running funding task.
pub struct FundingHandle {
    task: JoinHandle<FundingReport>,
    wait: Duration,
}

impl FundingHandle {
    /// Waits for the task, at most the configured time. On timeout the task keeps
    /// running in the background and `None` is returned.
    pub async fn wait(self) -> Option<FundingReport> {
        match tokio::time::timeout(self.wait, self.task).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(err)) => {
                log::warn!("funding task ended abnormally: {err}");
                Some(FundingReport::Failed {
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                log::debug!("funding still running after {:?}, continuing", self.wait);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Mutex;

    use mockito::Matcher;

    use super::*;
    use crate::ledger::{Coin, DryRunResult, ObjectRef};
    use crate::transaction::PendingTransaction;

    const ADDRESS: &str = "0x42dd208590e5958a16488cbc771dd324a4a5b0cd34eafaaf28e4ad351d36684f";

    fn address() -> LedgerAddress {
        LedgerAddress::from_str(ADDRESS).unwrap()
    }

    fn config(poll_attempts: u32) -> FundingConfig {
        FundingConfig {
            enabled: true,
            faucet_url: Some("http://faucet".to_string()),
            wait_ms: 2_000,
            poll_attempts,
            poll_interval_ms: 5,
        }
    }

    /// Ledger whose coins appear after a number of lookups.
    struct CoinLedger {
        appear_after: usize,
        lookups: Mutex<usize>,
    }

    #[async_trait]
    impl LedgerRpc for CoinLedger {
        async fn latest_epoch(&self) -> Result<u64, LoginKitError> {
            Ok(1)
        }

        async fn owned_objects(
            &self,
            _owner: &LedgerAddress,
            _struct_type: &str,
        ) -> Result<Vec<ObjectRef>, LoginKitError> {
            Ok(vec![])
        }

        async fn coins(&self, owner: &LedgerAddress) -> Result<Vec<Coin>, LoginKitError> {
            let mut lookups = self.lookups.lock().unwrap();
            *lookups += 1;
            if *lookups <= self.appear_after {
                return Ok(vec![]);
            }
            Ok(vec![
                Coin {
                    object_id: *owner,
                    balance: 600,
                },
                Coin {
                    object_id: *owner,
                    balance: 400,
                },
            ])
        }

        async fn build_move_call(
            &self,
            _transaction: &PendingTransaction,
        ) -> Result<String, LoginKitError> {
            Ok(String::new())
        }

        async fn dry_run(&self, _tx_bytes: &str) -> Result<DryRunResult, LoginKitError> {
            Err(LoginKitError::Generic {
                error: "unused".to_string(),
            })
        }
    }

    struct StubFaucet(Option<String>);

    #[async_trait]
    impl Faucet for StubFaucet {
        async fn request_funds(&self, _recipient: &LedgerAddress) -> Result<(), LoginKitError> {
            self.0.clone().map_or(Ok(()), |error| {
                Err(LoginKitError::NetworkError {
                    url: "http://faucet/gas".to_string(),
                    status: None,
                    error,
                })
            })
        }
    }

    fn assist(faucet: StubFaucet, appear_after: usize, poll_attempts: u32) -> FundingAssist {
        FundingAssist::new(
            Some(Arc::new(faucet)),
            Arc::new(CoinLedger {
                appear_after,
                lookups: Mutex::new(0),
            }),
            config(poll_attempts),
        )
    }

    #[tokio::test]
    async fn test_polls_until_coins_appear() {
        let report = assist(StubFaucet(None), 2, 5)
            .request_starter_funds(&address())
            .await;
        assert_eq!(
            report,
            FundingReport::Funded {
                coins: 2,
                balance: 1000
            }
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_poll_attempts() {
        let report = assist(StubFaucet(None), 10, 3)
            .request_starter_funds(&address())
            .await;
        assert_eq!(report, FundingReport::Pending);
    }

    #[tokio::test]
    async fn test_faucet_failure_is_reported_not_raised() {
        let handle = assist(StubFaucet(Some("connection refused".to_string())), 0, 1)
            .spawn(address())
            .unwrap();
        let report = handle.wait().await.unwrap();
        assert!(
            matches!(report, FundingReport::Failed { ref reason } if reason.contains("connection refused"))
        );
    }

    #[tokio::test]
    async fn test_disabled_funding_does_not_spawn() {
        let assist = FundingAssist::new(
            Some(Arc::new(StubFaucet(None))),
            Arc::new(CoinLedger {
                appear_after: 0,
                lookups: Mutex::new(0),
            }),
            FundingConfig::disabled(),
        );
        assert!(assist.spawn(address()).is_none());
        assert_eq!(
            assist.request_starter_funds(&address()).await,
            FundingReport::Skipped
        );
    }

    #[tokio::test]
    async fn test_http_faucet_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/gas")
            .match_body(Matcher::Json(json!({
                "FixedAmountRequest": { "recipient": ADDRESS }
            })))
            .with_status(201)
            .with_body(r#"{"transferredGasObjects":[{"amount":1000}],"error":null}"#)
            .create_async()
            .await;

        HttpFaucet::new(&server.url())
            .request_funds(&address())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_faucet_error_field() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/gas")
            .with_status(200)
            .with_body(r#"{"transferredGasObjects":[],"error":"Too many requests from this client"}"#)
            .create_async()
            .await;

        let err = HttpFaucet::new(&server.url())
            .request_funds(&address())
            .await
            .unwrap_err();
        assert!(
            matches!(err, LoginKitError::FundingBestEffortFailed { ref reason } if reason.starts_with("Too many"))
        );
    }
}
