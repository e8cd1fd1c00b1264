use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U64};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::types::{RawLog, RawReceipt};
use super::wallet::{TransactionRequest, WalletError, WalletEvent, WalletProvider, WalletSubscription};

const METHOD_NOT_FOUND: i64 = -32601;

/// Wallet backed by a JSON-RPC node that manages its own unlocked accounts
/// (a local dev node, or a signer proxy). Used by the command line client.
///
/// Nodes do not push account or network notifications. Subscribers only
/// receive events while [`JsonRpcWallet::watch_changes`] is polling.
pub struct JsonRpcWallet {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    poll_interval: Duration,
    events: broadcast::Sender<WalletEvent>,
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    #[serde(default)]
    topics: Vec<B256>,
    data: Bytes,
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        WalletError::Transport(error.to_string())
    }
}

/// Network id and authorized accounts as last seen by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    network: String,
    accounts: Vec<Address>,
}

/// Events a push-capable wallet would have emitted between two observations.
fn changes(previous: &Observed, current: &Observed) -> Vec<WalletEvent> {
    let mut events = Vec::new();
    if previous.network != current.network {
        events.push(WalletEvent::ChainChanged(current.network.clone()));
    }
    if previous.accounts != current.accounts {
        events.push(WalletEvent::AccountsChanged(current.accounts.clone()));
    }
    events
}

impl From<RpcReceipt> for RawReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        RawReceipt {
            transaction_hash: receipt.transaction_hash,
            // pre-Byzantium receipts carry no status; treat them as mined
            success: receipt.status.map_or(true, |status| status == U64::from(1)),
            logs: receipt
                .logs
                .into_iter()
                .map(|log| RawLog {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

impl JsonRpcWallet {
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(16);
        JsonRpcWallet {
            client: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
            poll_interval,
            events,
        }
    }

    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!("JSON-RPC {} (id {})", method, id);

        let response = self.client.post(&self.url).json(&body).send().await?;
        let envelope: RpcResponse<T> = response.json().await?;

        if let Some(error) = envelope.error {
            return Err(WalletError::from_rpc(error.code, error.message));
        }

        Ok(envelope.result)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, WalletError> {
        self.request_optional(method, params)
            .await?
            .ok_or_else(|| WalletError::Transport(format!("{} returned no result", method)))
    }

    async fn observe(&self) -> Result<Observed, WalletError> {
        Ok(Observed {
            network: self.network_id().await?,
            accounts: self.accounts().await?,
        })
    }

    /// Polls the node for network and account changes and publishes them
    /// to subscribers. Runs until the future is dropped.
    pub async fn watch_changes(&self) {
        let mut last: Option<Observed> = None;
        loop {
            match self.observe().await {
                Ok(current) => {
                    if let Some(previous) = &last {
                        for event in changes(previous, &current) {
                            // no subscribers is not an error
                            let _ = self.events.send(event);
                        }
                    }
                    last = Some(current);
                }
                Err(e) => tracing::warn!("Polling wallet state failed: {}", e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    fn is_available(&self) -> bool {
        !self.url.is_empty()
    }

    async fn network_id(&self) -> Result<String, WalletError> {
        self.request("net_version", json!([])).await
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        match self.request("eth_requestAccounts", json!([])).await {
            Err(WalletError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => self.accounts().await,
            other => other,
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.request("eth_accounts", json!([])).await
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, WalletError> {
        let params = json!([{
            "from": request.from,
            "to": request.to,
            "data": request.data,
            "value": request.value,
        }]);
        self.request("eth_sendTransaction", params).await
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<RawReceipt, WalletError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .request_optional("eth_getTransactionReceipt", json!([hash]))
                .await?;

            if let Some(receipt) = receipt {
                return Ok(receipt.into());
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
        let params = json!([{ "to": to, "data": data }, "latest"]);
        self.request("eth_call", params).await
    }

    fn subscribe(&self) -> WalletSubscription {
        WalletSubscription::new(self.events.subscribe())
    }
}
