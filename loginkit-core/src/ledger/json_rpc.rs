//! [`LedgerRpc`] over the fullnode's JSON-RPC API.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{
    types::u64_from_str_or_number, Coin, DryRunResult, LedgerRpc, ObjectRef,
};
use crate::{
    error::LoginKitError,
    http_request::Request,
    primitives::{LedgerAddress, ObjectId},
    transaction::{ExecutionStatus, GasSummary, PendingTransaction, ResolvedArg},
};

/// Page size requested from paginated endpoints.
const PAGE_SIZE: u32 = 50;
/// Upper bound on pages walked by one query.
const MAX_PAGES: usize = 20;

/// JSON-RPC client for a fullnode.
#[derive(Debug)]
pub struct JsonRpcLedger {
    url: String,
    request: Request,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// Creates a client for the fullnode at `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            request: Request::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Calls `method` and decodes its `result`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LoginKitError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .request
            .handle(self.request.post(&self.url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("Unknown error"));
            return Err(LoginKitError::NetworkError {
                url: self.url.clone(),
                status: Some(status.as_u16()),
                error,
            });
        }

        let envelope: RpcResponse<T> = response.json().await.map_err(|e| {
            LoginKitError::SerializationError {
                error: format!("invalid {method} response: {e}"),
            }
        })?;

        match (envelope.result, envelope.error) {
            (_, Some(error)) => Err(LoginKitError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(LoginKitError::SerializationError {
                error: format!("{method} response has neither result nor error"),
            }),
        }
    }

    /// Walks a cursor-paginated endpoint. `params` builds the parameter list for a
    /// given cursor.
    async fn paged<T: DeserializeOwned>(
        &self,
        method: &str,
        params: impl Fn(Option<&str>) -> Value + Send + Sync,
    ) -> Result<Vec<T>, LoginKitError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page: Page<T> = self.call(method, params(cursor.as_deref())).await?;
            items.extend(page.data);
            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => return Ok(items),
            }
        }
        log::warn!("{method}: stopped after {MAX_PAGES} pages");
        Ok(items)
    }
}

#[async_trait]
impl LedgerRpc for JsonRpcLedger {
    async fn latest_epoch(&self) -> Result<u64, LoginKitError> {
        let state: SystemState = self
            .call("suix_getLatestSuiSystemState", json!([]))
            .await?;
        Ok(state.epoch)
    }

    async fn owned_objects(
        &self,
        owner: &LedgerAddress,
        struct_type: &str,
    ) -> Result<Vec<ObjectRef>, LoginKitError> {
        let owner = owner.to_string();
        let responses: Vec<ObjectResponse> = self
            .paged("suix_getOwnedObjects", |cursor| {
                json!([
                    owner,
                    {
                        "filter": { "StructType": struct_type },
                        "options": { "showType": true },
                    },
                    cursor,
                    PAGE_SIZE,
                ])
            })
            .await?;

        Ok(responses
            .into_iter()
            .filter_map(|response| response.data)
            .map(|data| ObjectRef {
                object_id: data.object_id,
                version: data.version,
                digest: data.digest,
            })
            .collect())
    }

    async fn coins(&self, owner: &LedgerAddress) -> Result<Vec<Coin>, LoginKitError> {
        let owner = owner.to_string();
        let coins: Vec<CoinData> = self
            .paged("suix_getCoins", |cursor| {
                json!([owner, Value::Null, cursor, PAGE_SIZE])
            })
            .await?;
        Ok(coins
            .into_iter()
            .map(|coin| Coin {
                object_id: coin.coin_object_id,
                balance: coin.balance,
            })
            .collect())
    }

    async fn build_move_call(
        &self,
        transaction: &PendingTransaction,
    ) -> Result<String, LoginKitError> {
        let arguments: Vec<Value> = transaction
            .arguments
            .iter()
            .map(ResolvedArg::to_json)
            .collect();
        let built: TransactionBytes = self
            .call(
                "unsafe_moveCall",
                json!([
                    transaction.sender.to_string(),
                    transaction.target.package.to_string(),
                    transaction.target.module,
                    transaction.target.function,
                    [],
                    arguments,
                    Value::Null,
                    transaction.gas_budget.to_string(),
                ]),
            )
            .await?;
        Ok(built.tx_bytes)
    }

    async fn dry_run(&self, tx_bytes: &str) -> Result<DryRunResult, LoginKitError> {
        let response: DryRunResponse = self
            .call("sui_dryRunTransactionBlock", json!([tx_bytes]))
            .await?;

        let status = match response.effects.status.status.as_str() {
            "success" => ExecutionStatus::Success,
            _ => ExecutionStatus::Failure {
                error: response
                    .effects
                    .status
                    .error
                    .unwrap_or_else(|| "unknown execution failure".to_string()),
            },
        };
        let gas = response.effects.gas_used;
        Ok(DryRunResult {
            status,
            gas: GasSummary {
                computation_cost: gas.computation_cost,
                storage_cost: gas.storage_cost,
                storage_rebate: gas.storage_rebate,
            },
            event_count: response.events.len() as u64,
        })
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct SystemState {
    #[serde(deserialize_with = "u64_from_str_or_number")]
    epoch: u64,
}

#[derive(Deserialize)]
struct ObjectResponse {
    data: Option<ObjectData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectData {
    object_id: ObjectId,
    #[serde(deserialize_with = "u64_from_str_or_number")]
    version: u64,
    digest: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinData {
    coin_object_id: ObjectId,
    #[serde(deserialize_with = "u64_from_str_or_number")]
    balance: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBytes {
    tx_bytes: String,
}

#[derive(Deserialize)]
struct DryRunResponse {
    effects: Effects,
    #[serde(default)]
    events: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Effects {
    status: EffectsStatus,
    gas_used: GasUsed,
}

#[derive(Deserialize)]
struct EffectsStatus {
    status: String,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasUsed {
    #[serde(deserialize_with = "u64_from_str_or_number")]
    computation_cost: u64,
    #[serde(deserialize_with = "u64_from_str_or_number")]
    storage_cost: u64,
    #[serde(deserialize_with = "u64_from_str_or_number")]
    storage_rebate: u64,
}
