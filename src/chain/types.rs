//! Records exchanged with the chain gateway. Everything coming back from the
//! chain is narrowed into one of these before the translator sees it.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::core::{BillBlockError, BillBlockResult};

/// Status as reported by a read. Older deployments hand back the enum
/// ordinal, newer tooling the enum member name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    Ordinal(u8),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvoice {
    pub id: U256,
    pub provider: Address,
    pub client: Address,
    pub token: Address,
    pub amounts: Vec<U256>,
    pub total: U256,
    pub amount_released: U256,
    pub curr_milestone: U256,
    pub due_date: U256,
    pub status: RawStatus,
    pub is_erc721: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: B256,
    pub success: bool,
    pub logs: Vec<RawLog>,
}

/// Handle for a submitted, not yet mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: B256,
    pub label: &'static str,
}

/// State-mutating calls the front-end issues. Approvals go to the token
/// contract; everything else to the invoice contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    CreateInvoice {
        provider: Address,
        client: Address,
        token: Address,
        amounts: Vec<U256>,
        due_date: u64,
        is_erc721: bool,
    },
    Deposit {
        invoice_id: u64,
        token: Address,
        amounts: Vec<U256>,
        is_erc721: bool,
        value: U256,
    },
    Release {
        invoice_id: u64,
        release_until: u64,
    },
    Withdraw {
        token_id: U256,
        balance: U256,
    },
    ApproveErc20 {
        token: Address,
        spender: Address,
        amount: U256,
    },
    ApproveErc721 {
        token: Address,
        spender: Address,
        token_id: U256,
    },
}

impl ContractCall {
    /// Native value attached to the transaction.
    pub fn value(&self) -> U256 {
        match self {
            ContractCall::Deposit { value, .. } => *value,
            _ => U256::ZERO,
        }
    }

    /// Address the transaction is sent to.
    pub fn target(&self, invoice_contract: Address) -> Address {
        match self {
            ContractCall::ApproveErc20 { token, .. } | ContractCall::ApproveErc721 { token, .. } => *token,
            _ => invoice_contract,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContractCall::CreateInvoice { .. } => "createInvoice",
            ContractCall::Deposit { .. } => "deposit",
            ContractCall::Release { .. } => "release",
            ContractCall::Withdraw { .. } => "withdraw",
            ContractCall::ApproveErc20 { .. } | ContractCall::ApproveErc721 { .. } => "approve",
        }
    }

    pub fn is_approval(&self) -> bool {
        matches!(
            self,
            ContractCall::ApproveErc20 { .. } | ContractCall::ApproveErc721 { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCall {
    GetInvoice(u64),
    InvoicesByProvider(Address),
    InvoicesByClient(Address),
    TokenSymbol(Address),
    TokenDecimals(Address),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutput {
    Invoice(RawInvoice),
    Invoices(Vec<RawInvoice>),
    Symbol(String),
    Decimals(u8),
}

impl ReadOutput {
    pub fn into_invoice(self) -> BillBlockResult<RawInvoice> {
        match self {
            ReadOutput::Invoice(invoice) => Ok(invoice),
            other => Err(unexpected("invoice", &other)),
        }
    }

    pub fn into_invoices(self) -> BillBlockResult<Vec<RawInvoice>> {
        match self {
            ReadOutput::Invoices(invoices) => Ok(invoices),
            other => Err(unexpected("invoice list", &other)),
        }
    }

    pub fn into_symbol(self) -> BillBlockResult<String> {
        match self {
            ReadOutput::Symbol(symbol) => Ok(symbol),
            other => Err(unexpected("token symbol", &other)),
        }
    }

    pub fn into_decimals(self) -> BillBlockResult<u8> {
        match self {
            ReadOutput::Decimals(decimals) => Ok(decimals),
            other => Err(unexpected("token decimals", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &ReadOutput) -> BillBlockError {
    BillBlockError::NetworkError(format!("expected {} from read, got {:?}", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approvals_target_the_token_contract() {
        let contract = Address::repeat_byte(0xcc);
        let token = Address::repeat_byte(0x20);
        let approve = ContractCall::ApproveErc20 {
            token,
            spender: contract,
            amount: U256::from(10u64),
        };
        assert_eq!(approve.target(contract), token);
        assert!(approve.is_approval());
        assert_eq!(approve.value(), U256::ZERO);

        let release = ContractCall::Release {
            invoice_id: 1,
            release_until: 1,
        };
        assert_eq!(release.target(contract), contract);
        assert_eq!(release.label(), "release");
    }

    #[test]
    fn only_deposit_carries_value() {
        let deposit = ContractCall::Deposit {
            invoice_id: 1,
            token: Address::ZERO,
            amounts: vec![U256::from(5u64)],
            is_erc721: false,
            value: U256::from(5u64),
        };
        assert_eq!(deposit.value(), U256::from(5u64));
    }

    #[test]
    fn narrowing_the_wrong_output_is_a_network_error() {
        let err = ReadOutput::Symbol("DAI".to_string()).into_invoices().unwrap_err();
        assert!(matches!(err, BillBlockError::NetworkError(_)));
    }

    #[test]
    fn raw_status_accepts_ordinal_or_name() {
        let ordinal: RawStatus = serde_json::from_str("2").unwrap();
        assert_eq!(ordinal, RawStatus::Ordinal(2));
        let named: RawStatus = serde_json::from_str("\"PAID\"").unwrap();
        assert_eq!(named, RawStatus::Named("PAID".to_string()));
    }
}
