use std::fmt;

use alloy_primitives::{Address, U256};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Asset that settles an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "ERC721")]
    Erc721,
}

impl TokenType {
    /// Classifies an on-chain `(token, isErc721)` pair. The zero address is
    /// the native-currency sentinel regardless of the flag.
    pub fn from_chain(token_address: Address, is_erc721: bool) -> Self {
        if token_address == Address::ZERO {
            TokenType::Eth
        } else if is_erc721 {
            TokenType::Erc721
        } else {
            TokenType::Erc20
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Eth => write!(f, "ETH"),
            TokenType::Erc20 => write!(f, "ERC20"),
            TokenType::Erc721 => write!(f, "ERC721"),
        }
    }
}

/// Contract-reported invoice status. Ordinals follow the contract enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Created,
    Funded,
    PartiallyPaid,
    Paid,
    Terminated,
}

impl InvoiceStatus {
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(InvoiceStatus::Created),
            1 => Some(InvoiceStatus::Funded),
            2 => Some(InvoiceStatus::PartiallyPaid),
            3 => Some(InvoiceStatus::Paid),
            4 => Some(InvoiceStatus::Terminated),
            _ => None,
        }
    }

    /// Accepts `PARTIALLY_PAID`, `partiallyPaid`, `Partially Paid` and the like.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "CREATED" => Some(InvoiceStatus::Created),
            "FUNDED" => Some(InvoiceStatus::Funded),
            "PARTIALLYPAID" => Some(InvoiceStatus::PartiallyPaid),
            "PAID" => Some(InvoiceStatus::Paid),
            "TERMINATED" => Some(InvoiceStatus::Terminated),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            InvoiceStatus::Created => 0,
            InvoiceStatus::Funded => 1,
            InvoiceStatus::PartiallyPaid => 2,
            InvoiceStatus::Paid => 3,
            InvoiceStatus::Terminated => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Terminated)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Created => write!(f, "CREATED"),
            InvoiceStatus::Funded => write!(f, "FUNDED"),
            InvoiceStatus::PartiallyPaid => write!(f, "PARTIALLY_PAID"),
            InvoiceStatus::Paid => write!(f, "PAID"),
            InvoiceStatus::Terminated => write!(f, "TERMINATED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub amount: String, // decimal string, e.g. "0.75"
}

impl Milestone {
    pub fn new(name: impl Into<String>, amount: impl Into<String>) -> Self {
        Milestone {
            name: name.into(),
            amount: amount.into(),
        }
    }
}

/// What the invoice is denominated in. Exactly one of amount / token id
/// exists, selected by the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tokenType")]
pub enum InvoiceAsset {
    #[serde(rename = "ETH")]
    Eth { amount: String },
    #[serde(rename = "ERC20", rename_all = "camelCase")]
    Erc20 {
        token_address: Address,
        token_symbol: Option<String>,
        decimals: u8,
        amount: String,
    },
    #[serde(rename = "ERC721", rename_all = "camelCase")]
    Erc721 {
        token_address: Address,
        token_symbol: Option<String>,
        token_id: U256,
    },
}

impl InvoiceAsset {
    pub fn token_type(&self) -> TokenType {
        match self {
            InvoiceAsset::Eth { .. } => TokenType::Eth,
            InvoiceAsset::Erc20 { .. } => TokenType::Erc20,
            InvoiceAsset::Erc721 { .. } => TokenType::Erc721,
        }
    }

    /// Zero address for ETH.
    pub fn token_address(&self) -> Address {
        match self {
            InvoiceAsset::Eth { .. } => Address::ZERO,
            InvoiceAsset::Erc20 { token_address, .. } | InvoiceAsset::Erc721 { token_address, .. } => {
                *token_address
            }
        }
    }

    pub fn token_symbol(&self) -> Option<&str> {
        match self {
            InvoiceAsset::Eth { .. } => Some("ETH"),
            InvoiceAsset::Erc20 { token_symbol, .. } | InvoiceAsset::Erc721 { token_symbol, .. } => {
                token_symbol.as_deref()
            }
        }
    }

    pub fn amount(&self) -> Option<&str> {
        match self {
            InvoiceAsset::Eth { amount } | InvoiceAsset::Erc20 { amount, .. } => Some(amount),
            InvoiceAsset::Erc721 { .. } => None,
        }
    }

    pub fn token_id(&self) -> Option<U256> {
        match self {
            InvoiceAsset::Erc721 { token_id, .. } => Some(*token_id),
            _ => None,
        }
    }

    /// Decimal precision of fungible amounts; `None` for ERC721.
    pub fn decimals(&self) -> Option<u8> {
        match self {
            InvoiceAsset::Eth { .. } => Some(18),
            InvoiceAsset::Erc20 { decimals, .. } => Some(*decimals),
            InvoiceAsset::Erc721 { .. } => None,
        }
    }

    pub fn is_erc721(&self) -> bool {
        matches!(self, InvoiceAsset::Erc721 { .. })
    }
}

/// Invoice as the UI sees it: on-chain fields merged with cached metadata.
/// Rebuilt on every fetch, never persisted as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: u64,
    pub provider_address: Address,
    pub client_address: Address,
    pub date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    #[serde(flatten)]
    pub asset: InvoiceAsset,
    pub milestones: Vec<Milestone>,
    pub curr_milestone: u64,
    pub amount_released: Option<String>,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn token_type(&self) -> TokenType {
        self.asset.token_type()
    }

    pub fn has_milestones(&self) -> bool {
        !self.milestones.is_empty()
    }
}

/// Create-form input. Every field is as the user typed it; nothing here has
/// been validated yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub provider_address: String,
    pub client_address: String,
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub item_name: String,
    pub item_description: Option<String>,
    pub token_type: Option<TokenType>,
    pub amount: Option<String>,
    pub token_id: Option<String>,
    pub token_symbol: Option<String>,
    pub token_address: Option<String>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_is_always_eth() {
        assert_eq!(TokenType::from_chain(Address::ZERO, false), TokenType::Eth);
        assert_eq!(TokenType::from_chain(Address::ZERO, true), TokenType::Eth);
        let token = Address::repeat_byte(0xab);
        assert_eq!(TokenType::from_chain(token, false), TokenType::Erc20);
        assert_eq!(TokenType::from_chain(token, true), TokenType::Erc721);
    }

    #[test]
    fn status_names_and_ordinals_agree() {
        for ordinal in 0..5u8 {
            let status = InvoiceStatus::from_ordinal(ordinal).unwrap();
            assert_eq!(status.ordinal(), ordinal);
            assert_eq!(InvoiceStatus::from_name(&status.to_string()), Some(status));
        }
        assert_eq!(InvoiceStatus::from_ordinal(5), None);
        assert_eq!(InvoiceStatus::from_name("partiallyPaid"), Some(InvoiceStatus::PartiallyPaid));
        assert_eq!(InvoiceStatus::from_name("Partially Paid"), Some(InvoiceStatus::PartiallyPaid));
        assert_eq!(InvoiceStatus::from_name("refunded"), None);
    }

    #[test]
    fn erc721_asset_has_token_id_and_no_amount() {
        let asset = InvoiceAsset::Erc721 {
            token_address: Address::repeat_byte(0x01),
            token_symbol: Some("PUNK".to_string()),
            token_id: U256::from(42u64),
        };
        assert_eq!(asset.amount(), None);
        assert_eq!(asset.token_id(), Some(U256::from(42u64)));
        assert_eq!(asset.decimals(), None);
        assert!(asset.is_erc721());
    }

    #[test]
    fn eth_asset_uses_zero_address_sentinel() {
        let asset = InvoiceAsset::Eth {
            amount: "1.5".to_string(),
        };
        assert_eq!(asset.token_address(), Address::ZERO);
        assert_eq!(asset.token_symbol(), Some("ETH"));
        assert_eq!(asset.token_type(), TokenType::Eth);
    }

    #[test]
    fn invoice_serializes_flat_token_type() {
        let invoice = Invoice {
            id: 3,
            provider_address: Address::repeat_byte(0x01),
            client_address: Address::repeat_byte(0x02),
            date: None,
            due_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            item_name: Some("Logo".to_string()),
            item_description: None,
            asset: InvoiceAsset::Eth {
                amount: "2".to_string(),
            },
            milestones: Vec::new(),
            curr_milestone: 0,
            amount_released: Some("0".to_string()),
            status: InvoiceStatus::Funded,
        };

        let value = serde_json::to_value(&invoice).unwrap();
        assert_eq!(value["tokenType"], "ETH");
        assert_eq!(value["amount"], "2");
        assert_eq!(value["status"], "FUNDED");
        assert_eq!(value["itemName"], "Logo");
    }
}
