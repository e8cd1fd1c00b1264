use serde::Serialize;

use crate::models::{Invoice, InvoiceAsset, InvoiceStatus};

/// Button offered next to an invoice on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceAction {
    Pay,
    Release,
    View,
}

/// `own` is true for invoices the connected account issued.
pub fn available_action(status: InvoiceStatus, own: bool) -> InvoiceAction {
    if own {
        return InvoiceAction::View;
    }
    match status {
        InvoiceStatus::Created => InvoiceAction::Pay,
        InvoiceStatus::Funded | InvoiceStatus::PartiallyPaid => InvoiceAction::Release,
        InvoiceStatus::Paid | InvoiceStatus::Terminated => InvoiceAction::View,
    }
}

pub fn display_amount(invoice: &Invoice) -> String {
    let symbol = invoice.asset.token_symbol().unwrap_or("TOKEN");
    match &invoice.asset {
        InvoiceAsset::Eth { amount } => format!("{} ETH", amount),
        InvoiceAsset::Erc20 { amount, .. } => format!("{} {}", amount, symbol),
        InvoiceAsset::Erc721 { token_id, .. } => format!("{} #{}", symbol, token_id),
    }
}

/// Confirmation text shown before paying. Token payments warn about the
/// extra approval signature.
pub fn pay_prompt(invoice: &Invoice) -> String {
    const TWO_SIGNATURES: &str = "You will receive two transactions to sign. \
        First the token approval transaction, then the payment transaction.";

    match &invoice.asset {
        InvoiceAsset::Eth { .. } => format!("Paying {} to invoice #{}", display_amount(invoice), invoice.id),
        InvoiceAsset::Erc20 { .. } | InvoiceAsset::Erc721 { .. } => format!(
            "Paying {} to invoice #{}. {}",
            display_amount(invoice),
            invoice.id,
            TWO_SIGNATURES
        ),
    }
}

pub fn payment_link(base_url: &str, invoice_id: u64) -> String {
    format!("{}/pay/{}", base_url.trim_end_matches('/'), invoice_id)
}
