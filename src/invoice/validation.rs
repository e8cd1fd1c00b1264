use std::str::FromStr;

use alloy_primitives::{Address, U256};
use chrono::NaiveDate;

use super::units::{to_base_units, ETH_DECIMALS};
use crate::core::{BillBlockError, BillBlockResult};
use crate::models::{InvoiceDraft, Milestone, TokenType};

/// Token the user picked: a symbol, an address, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInput {
    pub symbol: Option<String>,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftAsset {
    Eth { amount: String },
    Erc20 { token: TokenInput, amount: String },
    Erc721 { token: TokenInput, token_id: U256 },
}

/// A draft that passed every client-side rule. Token resolution and base
/// unit conversion still happen in the create flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDraft {
    pub provider: Address,
    pub client: Address,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub item_name: String,
    pub item_description: Option<String>,
    pub asset: DraftAsset,
    pub milestones: Vec<Milestone>,
}

/// Syntactic address check: `0x` followed by 40 hex digits.
pub fn parse_address(raw: &str) -> Option<Address> {
    let raw = raw.trim();
    if raw.len() != 42 || !(raw.starts_with("0x") || raw.starts_with("0X")) {
        return None;
    }
    Address::from_str(raw).ok()
}

pub fn parse_token_id(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks a draft against every rule and reports all violations at once.
pub fn validate_draft(draft: &InvoiceDraft) -> BillBlockResult<ValidatedDraft> {
    let mut violations = Vec::new();

    let provider = parse_address(&draft.provider_address);
    if provider.is_none() {
        violations.push("provider address is not a valid address".to_string());
    }
    let client = parse_address(&draft.client_address);
    if client.is_none() {
        violations.push("client address is not a valid address".to_string());
    }

    match (draft.date, draft.due_date) {
        (Some(date), Some(due_date)) if due_date < date => {
            violations.push("due date must not be before the invoice date".to_string());
        }
        (date, due_date) => {
            if date.is_none() {
                violations.push("invoice date is required".to_string());
            }
            if due_date.is_none() {
                violations.push("due date is required".to_string());
            }
        }
    }

    let item_name = draft.item_name.trim();
    if item_name.is_empty() {
        violations.push("item name is required".to_string());
    }

    let amount = non_empty(&draft.amount);
    let token_id = non_empty(&draft.token_id);
    let symbol = non_empty(&draft.token_symbol);
    let token_address = non_empty(&draft.token_address);

    let asset = match draft.token_type {
        None => {
            violations.push("token type is required".to_string());
            None
        }
        Some(TokenType::Eth) => {
            if token_id.is_some() {
                violations.push("ETH invoices take an amount, not a token id".to_string());
            }
            check_amount(amount, "amount", &mut violations)
                .map(|amount| DraftAsset::Eth { amount: amount.to_string() })
        }
        Some(TokenType::Erc20) => {
            if token_id.is_some() {
                violations.push("ERC20 invoices take an amount, not a token id".to_string());
            }
            let token = check_token(symbol, token_address, &mut violations);
            let amount = check_amount(amount, "amount", &mut violations);
            match (token, amount) {
                (Some(token), Some(amount)) => Some(DraftAsset::Erc20 {
                    token,
                    amount: amount.to_string(),
                }),
                _ => None,
            }
        }
        Some(TokenType::Erc721) => {
            if amount.is_some() {
                violations.push("ERC721 invoices take a token id, not an amount".to_string());
            }
            if !draft.milestones.is_empty() {
                violations.push("ERC721 invoices cannot have milestones".to_string());
            }
            let token = check_token(symbol, token_address, &mut violations);
            let token_id = match token_id {
                None => {
                    violations.push("token id is required".to_string());
                    None
                }
                Some(raw) => {
                    let parsed = parse_token_id(raw);
                    if parsed.is_none() {
                        violations.push(format!("token id \"{}\" must be a non-negative integer", raw));
                    }
                    parsed
                }
            };
            match (token, token_id) {
                (Some(token), Some(token_id)) => Some(DraftAsset::Erc721 { token, token_id }),
                _ => None,
            }
        }
    };

    if draft.token_type != Some(TokenType::Erc721) && !draft.milestones.is_empty() {
        check_milestones(&draft.milestones, amount, &mut violations);
    }

    if !violations.is_empty() {
        return Err(BillBlockError::InvalidInput(violations));
    }

    // Every branch that leaves these as None has pushed a violation.
    match (provider, client, draft.date, draft.due_date, asset) {
        (Some(provider), Some(client), Some(date), Some(due_date), Some(asset)) => Ok(ValidatedDraft {
            provider,
            client,
            date,
            due_date,
            item_name: item_name.to_string(),
            item_description: non_empty(&draft.item_description).map(str::to_string),
            asset,
            milestones: draft
                .milestones
                .iter()
                .map(|m| Milestone::new(m.name.trim(), m.amount.trim()))
                .collect(),
        }),
        _ => Err(BillBlockError::invalid_input("invoice is incomplete")),
    }
}

fn check_amount<'a>(amount: Option<&'a str>, label: &str, violations: &mut Vec<String>) -> Option<&'a str> {
    let Some(amount) = amount else {
        violations.push(format!("{} is required", label));
        return None;
    };

    match to_base_units(amount, ETH_DECIMALS) {
        Ok(value) if value > U256::ZERO => Some(amount),
        Ok(_) => {
            violations.push(format!("{} must be greater than zero", label));
            None
        }
        Err(_) => {
            violations.push(format!("{} \"{}\" is not a number", label, amount));
            None
        }
    }
}

fn check_token(
    symbol: Option<&str>,
    address: Option<&str>,
    violations: &mut Vec<String>,
) -> Option<TokenInput> {
    let parsed_address = match address {
        Some(raw) => match parse_address(raw) {
            Some(address) => Some(address),
            None => {
                violations.push("token address is not a valid address".to_string());
                return None;
            }
        },
        None => None,
    };

    if symbol.is_none() && parsed_address.is_none() {
        violations.push("token symbol or token address is required".to_string());
        return None;
    }

    Some(TokenInput {
        symbol: symbol.map(str::to_string),
        address: parsed_address,
    })
}

fn check_milestones(milestones: &[Milestone], total: Option<&str>, violations: &mut Vec<String>) {
    let mut sum = Some(U256::ZERO);

    for (index, milestone) in milestones.iter().enumerate() {
        if milestone.name.trim().is_empty() {
            violations.push(format!("milestone {} needs a name", index + 1));
        }
        let label = format!("milestone {} amount", index + 1);
        let amount = check_amount(Some(milestone.amount.trim()).filter(|a| !a.is_empty()), &label, violations);
        sum = match (sum, amount.and_then(|a| to_base_units(a, ETH_DECIMALS).ok())) {
            (Some(sum), Some(value)) => sum.checked_add(value),
            _ => None,
        };
    }

    let total = total.and_then(|t| to_base_units(t, ETH_DECIMALS).ok());
    if let (Some(sum), Some(total)) = (sum, total) {
        if sum != total {
            violations.push("milestone amounts must add up to the invoice amount".to_string());
        }
    }
}
