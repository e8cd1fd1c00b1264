use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;

use crate::core::{BillBlockError, BillBlockResult};

pub const ETH_DECIMALS: u8 = 18;

/// Parses a user-entered decimal string ("1.5") into base units. Amounts
/// finer than `decimals` are rejected rather than rounded.
pub fn to_base_units(amount: &str, decimals: u8) -> BillBlockResult<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(BillBlockError::invalid_input("amount is required"));
    }

    if fraction_digits(trimmed) > usize::from(decimals) {
        return Err(BillBlockError::invalid_input(format!(
            "\"{}\" has more than {} decimal places for this token",
            trimmed, decimals
        )));
    }

    let parsed = parse_units(trimmed, decimals).map_err(|e| {
        BillBlockError::invalid_input(format!("\"{}\" is not a valid amount ({})", trimmed, e))
    })?;

    if parsed.is_negative() {
        return Err(BillBlockError::invalid_input(format!(
            "\"{}\" must not be negative",
            trimmed
        )));
    }

    Ok(parsed.get_absolute())
}

/// Significant digits after the decimal point; trailing zeros don't count.
fn fraction_digits(amount: &str) -> usize {
    amount
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.trim_end_matches('0').len())
}

/// Renders base units as the shortest decimal string: 1.5e18 wei → "1.5".
pub fn from_base_units(value: U256, decimals: u8) -> String {
    let formatted = match format_units(value, decimals) {
        Ok(formatted) => formatted,
        Err(_) => return value.to_string(),
    };

    if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        formatted
    }
}

/// Sum of a base-unit schedule; `None` on overflow.
pub fn checked_sum(amounts: &[U256]) -> Option<U256> {
    amounts
        .iter()
        .try_fold(U256::ZERO, |total, amount| total.checked_add(*amount))
}
