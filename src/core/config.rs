use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;

use super::error::{BillBlockError, BillBlockResult};
use crate::invoice::tokens::TokenTable;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network_id: String,
    pub contract_address: Address,
    pub rpc_url: String,
    pub base_url: String,
    pub redis_url: Option<String>,
    pub token_table: TokenTable,
    pub receipt_poll_interval: Duration,
}

impl AppConfig {
    pub fn builder(contract_address: Address) -> AppConfigBuilder {
        AppConfigBuilder {
            contract_address,
            ..AppConfigBuilder::default()
        }
    }

    /// Reads the configuration from environment variables. Call
    /// `dotenv::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> BillBlockResult<Self> {
        let contract_address = env::var("CONTRACT_ADDRESS")
            .map_err(|_| BillBlockError::Config("CONTRACT_ADDRESS is not set".to_string()))?;
        let contract_address = Address::from_str(contract_address.trim()).map_err(|e| {
            BillBlockError::Config(format!("CONTRACT_ADDRESS is not an address: {}", e))
        })?;

        let mut token_table = TokenTable::builtin();
        if let Ok(raw) = env::var("TOKEN_TABLE") {
            let overrides = TokenTable::from_json(&raw)
                .map_err(|e| BillBlockError::Config(format!("TOKEN_TABLE: {}", e)))?;
            token_table.merge(overrides);
        }

        let poll_ms = env::var("RECEIPT_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<u64>()
            .map_err(|e| BillBlockError::Config(format!("RECEIPT_POLL_INTERVAL_MS: {}", e)))?;

        Ok(AppConfig {
            network_id: env::var("NETWORK_ID").unwrap_or_else(|_| "1".to_string()),
            contract_address,
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            token_table,
            receipt_poll_interval: Duration::from_millis(poll_ms),
        })
    }

    /// Human readable name of the configured network, used in mismatch errors.
    pub fn network_name(&self) -> String {
        network_name(&self.network_id)
    }

    /// Namespace for cached invoice metadata.
    pub fn cache_prefix(&self) -> String {
        format!("billblock:{}", self.contract_address)
    }
}

pub fn network_name(network_id: &str) -> String {
    match network_id {
        "1" => "Ethereum mainnet".to_string(),
        "5" => "Goerli testnet".to_string(),
        "11155111" => "Sepolia testnet".to_string(),
        other => format!("network {}", other),
    }
}

#[derive(Default)]
pub struct AppConfigBuilder {
    contract_address: Address,
    network_id: Option<String>,
    rpc_url: Option<String>,
    base_url: Option<String>,
    redis_url: Option<String>,
    token_table: Option<TokenTable>,
    receipt_poll_interval: Option<Duration>,
}

impl AppConfigBuilder {
    pub fn network_id(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = Some(network_id.into());
        self
    }

    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn token_table(mut self, table: TokenTable) -> Self {
        self.token_table = Some(table);
        self
    }

    pub fn receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> AppConfig {
        AppConfig {
            network_id: self.network_id.unwrap_or_else(|| "1".to_string()),
            contract_address: self.contract_address,
            rpc_url: self.rpc_url.unwrap_or_else(|| "http://127.0.0.1:8545".to_string()),
            base_url: self.base_url.unwrap_or_else(|| "http://localhost:3000".to_string()),
            redis_url: self.redis_url,
            token_table: self.token_table.unwrap_or_else(TokenTable::builtin),
            receipt_poll_interval: self
                .receipt_poll_interval
                .unwrap_or_else(|| Duration::from_millis(1000)),
        }
    }
}
