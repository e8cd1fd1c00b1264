//! Raw on-chain invoice → semantic [`Invoice`]. No I/O happens here; token
//! details and cached metadata are looked up by the caller.

use alloy_primitives::U256;
use chrono::{DateTime, NaiveDate};

use super::units::{from_base_units, ETH_DECIMALS};
use crate::chain::{RawInvoice, RawStatus};
use crate::core::{BillBlockError, BillBlockResult};
use crate::models::{Invoice, InvoiceAsset, InvoiceMetadata, InvoiceStatus, Milestone, TokenType};

/// What the caller knows about the settling token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: Option<String>,
    pub decimals: u8,
}

impl Default for TokenInfo {
    fn default() -> Self {
        TokenInfo {
            symbol: None,
            decimals: ETH_DECIMALS,
        }
    }
}

pub fn translate_status(status: &RawStatus) -> BillBlockResult<InvoiceStatus> {
    let translated = match status {
        RawStatus::Ordinal(ordinal) => InvoiceStatus::from_ordinal(*ordinal),
        RawStatus::Named(name) => InvoiceStatus::from_name(name),
    };
    translated.ok_or_else(|| malformed(format!("unknown invoice status {:?}", status)))
}

pub fn epoch_to_date(seconds: U256) -> BillBlockResult<NaiveDate> {
    let seconds = i64::try_from(seconds).map_err(|_| malformed("due date out of range"))?;
    DateTime::from_timestamp(seconds, 0)
        .map(|moment| moment.date_naive())
        .ok_or_else(|| malformed("due date out of range"))
}

pub fn translate(
    raw: &RawInvoice,
    metadata: Option<&InvoiceMetadata>,
    token: &TokenInfo,
) -> BillBlockResult<Invoice> {
    let id = u64::try_from(raw.id).map_err(|_| malformed("invoice id out of range"))?;
    let curr_milestone =
        u64::try_from(raw.curr_milestone).map_err(|_| malformed("milestone cursor out of range"))?;

    let symbol = metadata
        .and_then(|m| m.token_symbol.clone())
        .or_else(|| token.symbol.clone());

    let (asset, amount_released) = match TokenType::from_chain(raw.token, raw.is_erc721) {
        TokenType::Eth => (
            InvoiceAsset::Eth {
                amount: from_base_units(raw.total, ETH_DECIMALS),
            },
            Some(from_base_units(raw.amount_released, ETH_DECIMALS)),
        ),
        TokenType::Erc20 => (
            InvoiceAsset::Erc20 {
                token_address: raw.token,
                token_symbol: symbol,
                decimals: token.decimals,
                amount: from_base_units(raw.total, token.decimals),
            },
            Some(from_base_units(raw.amount_released, token.decimals)),
        ),
        TokenType::Erc721 => {
            let token_id = raw
                .amounts
                .first()
                .copied()
                .ok_or_else(|| malformed(format!("ERC721 invoice {} has no token id", id)))?;
            (
                InvoiceAsset::Erc721 {
                    token_address: raw.token,
                    token_symbol: symbol,
                    token_id,
                },
                None,
            )
        }
    };

    let milestones = match asset.decimals() {
        Some(decimals) => merge_milestones(&raw.amounts, metadata, decimals),
        None => Vec::new(),
    };

    Ok(Invoice {
        id,
        provider_address: raw.provider,
        client_address: raw.client,
        date: metadata.map(|m| m.date),
        due_date: epoch_to_date(raw.due_date)?,
        item_name: metadata.map(|m| m.item_name.clone()),
        item_description: metadata.and_then(|m| m.item_description.clone()),
        asset,
        milestones,
        curr_milestone,
        amount_released,
        status: translate_status(&raw.status)?,
    })
}

/// On-chain amounts are authoritative; cached names are zipped on by
/// position.
fn merge_milestones(amounts: &[U256], metadata: Option<&InvoiceMetadata>, decimals: u8) -> Vec<Milestone> {
    let cached = metadata.map(|m| m.milestones.as_slice()).unwrap_or_default();
    if cached.is_empty() && amounts.len() <= 1 {
        return Vec::new();
    }

    amounts
        .iter()
        .enumerate()
        .map(|(index, amount)| Milestone {
            name: cached.get(index).map(|m| m.name.clone()).unwrap_or_default(),
            amount: from_base_units(*amount, decimals),
        })
        .collect()
}

fn malformed(message: impl Into<String>) -> BillBlockError {
    BillBlockError::NetworkError(format!("malformed invoice from contract: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use proptest::prelude::*;

    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn raw_eth(total: u128) -> RawInvoice {
        RawInvoice {
            id: U256::from(1u64),
            provider: Address::repeat_byte(0x01),
            client: Address::repeat_byte(0x02),
            token: Address::ZERO,
            amounts: vec![U256::from(total)],
            total: U256::from(total),
            amount_released: U256::ZERO,
            curr_milestone: U256::ZERO,
            due_date: U256::from(1_767_139_200u64), // 2025-12-31
            status: RawStatus::Ordinal(0),
            is_erc721: false,
        }
    }

    fn metadata() -> InvoiceMetadata {
        InvoiceMetadata {
            item_name: "Audit".to_string(),
            item_description: None,
            date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            token_symbol: None,
            milestones: Vec::new(),
        }
    }

    #[test]
    fn eth_invoice_without_metadata_degrades_gracefully() {
        let invoice = translate(&raw_eth(3 * ETHER / 2), None, &TokenInfo::default()).unwrap();

        assert_eq!(invoice.token_type(), TokenType::Eth);
        assert_eq!(invoice.asset.amount(), Some("1.5"));
        assert_eq!(invoice.asset.token_address(), Address::ZERO);
        assert_eq!(invoice.status, InvoiceStatus::Created);
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(invoice.item_name, None);
        assert_eq!(invoice.date, None);
        assert!(invoice.milestones.is_empty());
    }

    #[test]
    fn merges_cached_metadata() {
        let mut cached = metadata();
        cached.item_description = Some("Smart contract review".to_string());
        let invoice = translate(&raw_eth(ETHER), Some(&cached), &TokenInfo::default()).unwrap();

        assert_eq!(invoice.item_name.as_deref(), Some("Audit"));
        assert_eq!(invoice.item_description.as_deref(), Some("Smart contract review"));
        assert_eq!(invoice.date, NaiveDate::from_ymd_opt(2025, 12, 1));
    }

    #[test]
    fn erc20_uses_token_decimals_and_cached_symbol() {
        let mut raw = raw_eth(0);
        raw.token = Address::repeat_byte(0x20);
        raw.total = U256::from(10_000_000u64);
        raw.amounts = vec![U256::from(4_000_000u64), U256::from(6_000_000u64)];
        raw.amount_released = U256::from(4_000_000u64);
        raw.curr_milestone = U256::from(1u64);
        raw.status = RawStatus::Named("PARTIALLY_PAID".to_string());

        let mut cached = metadata();
        cached.token_symbol = Some("USDC".to_string());
        cached.milestones = vec![Milestone::new("Design", "4"), Milestone::new("Build", "6")];

        let token = TokenInfo {
            symbol: Some("USD Coin".to_string()),
            decimals: 6,
        };
        let invoice = translate(&raw, Some(&cached), &token).unwrap();

        assert_eq!(invoice.token_type(), TokenType::Erc20);
        assert_eq!(invoice.asset.amount(), Some("10"));
        assert_eq!(invoice.asset.token_symbol(), Some("USDC"));
        assert_eq!(invoice.amount_released.as_deref(), Some("4"));
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.curr_milestone, 1);
        assert_eq!(
            invoice.milestones,
            vec![Milestone::new("Design", "4"), Milestone::new("Build", "6")]
        );
    }

    #[test]
    fn unnamed_milestones_when_cache_is_missing() {
        let mut raw = raw_eth(0);
        raw.amounts = vec![U256::from(ETHER), U256::from(ETHER / 2)];
        raw.total = U256::from(3 * ETHER / 2);

        let invoice = translate(&raw, None, &TokenInfo::default()).unwrap();
        assert_eq!(
            invoice.milestones,
            vec![Milestone::new("", "1"), Milestone::new("", "0.5")]
        );
    }

    #[test]
    fn erc721_takes_token_id_from_amounts() {
        let mut raw = raw_eth(0);
        raw.token = Address::repeat_byte(0x72);
        raw.is_erc721 = true;
        raw.amounts = vec![U256::from(42u64)];
        raw.total = U256::from(42u64);
        raw.status = RawStatus::Ordinal(1);

        let invoice = translate(&raw, None, &TokenInfo::default()).unwrap();
        assert_eq!(invoice.token_type(), TokenType::Erc721);
        assert_eq!(invoice.asset.token_id(), Some(U256::from(42u64)));
        assert_eq!(invoice.asset.amount(), None);
        assert_eq!(invoice.amount_released, None);
        assert!(invoice.milestones.is_empty());
        assert_eq!(invoice.status, InvoiceStatus::Funded);
    }

    #[test]
    fn erc721_without_token_id_is_malformed() {
        let mut raw = raw_eth(0);
        raw.token = Address::repeat_byte(0x72);
        raw.is_erc721 = true;
        raw.amounts.clear();
        assert!(matches!(
            translate(&raw, None, &TokenInfo::default()),
            Err(BillBlockError::NetworkError(_))
        ));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut raw = raw_eth(ETHER);
        raw.status = RawStatus::Ordinal(9);
        assert!(translate(&raw, None, &TokenInfo::default()).is_err());
    }

    proptest! {
        #[test]
        fn token_type_rederives_from_translated_fields(
            token_byte in 0u8..4,
            is_erc721 in any::<bool>(),
            token_id in 0u64..1_000_000,
        ) {
            let mut raw = raw_eth(ETHER);
            raw.token = Address::repeat_byte(token_byte);
            raw.is_erc721 = is_erc721;
            raw.amounts = vec![U256::from(token_id)];

            let invoice = translate(&raw, None, &TokenInfo::default()).unwrap();
            let rederived = TokenType::from_chain(invoice.asset.token_address(), invoice.asset.is_erc721());
            prop_assert_eq!(invoice.token_type(), rederived);
            prop_assert_eq!(invoice.token_type(), TokenType::from_chain(raw.token, raw.is_erc721));
            if invoice.token_type() == TokenType::Erc721 {
                prop_assert!(invoice.milestones.is_empty());
                prop_assert!(invoice.asset.amount().is_none());
            }
        }
    }
}
