use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::Address;
use once_cell::sync::Lazy;

static BUILTIN: Lazy<Vec<(&'static str, &'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("1", "USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        ("1", "USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
        ("1", "DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
        ("1", "WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
    ]
});

/// Per-network symbol → token address table. Symbols are matched
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    networks: HashMap<String, HashMap<String, Address>>,
}

impl TokenTable {
    pub fn new() -> Self {
        TokenTable::default()
    }

    pub fn builtin() -> Self {
        let mut table = TokenTable::new();
        for (network, symbol, address) in BUILTIN.iter() {
            if let Ok(address) = Address::from_str(address) {
                table.insert(network, symbol, address);
            }
        }
        table
    }

    /// Parses `{"5": {"USDC": "0x..."}}`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: HashMap<String, HashMap<String, Address>> = serde_json::from_str(raw)?;
        let mut table = TokenTable::new();
        for (network, tokens) in parsed {
            for (symbol, address) in tokens {
                table.insert(&network, &symbol, address);
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, network_id: &str, symbol: &str, address: Address) {
        self.networks
            .entry(network_id.to_string())
            .or_default()
            .insert(symbol.to_uppercase(), address);
    }

    /// Entries in `other` win.
    pub fn merge(&mut self, other: TokenTable) {
        for (network, tokens) in other.networks {
            self.networks.entry(network).or_default().extend(tokens);
        }
    }

    pub fn address_of(&self, network_id: &str, symbol: &str) -> Option<Address> {
        self.networks
            .get(network_id)?
            .get(&symbol.trim().to_uppercase())
            .copied()
    }

    pub fn symbol_of(&self, network_id: &str, address: Address) -> Option<String> {
        self.networks
            .get(network_id)?
            .iter()
            .find(|(_, candidate)| **candidate == address)
            .map(|(symbol, _)| symbol.clone())
    }
}
