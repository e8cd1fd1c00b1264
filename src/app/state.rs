use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use serde::Serialize;
use tokio::sync::watch;

use crate::models::Invoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    Create,
    Pay,
    Release,
    Withdraw,
}

/// Result of the last state-mutating operation, kept until the UI clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub action: TransactionAction,
    pub success: bool,
    pub transaction_hash: Option<B256>,
    pub invoice_id: Option<u64>,
    pub message: Option<String>,
}

impl TransactionOutcome {
    pub fn succeeded(action: TransactionAction, transaction_hash: B256, invoice_id: Option<u64>) -> Self {
        TransactionOutcome {
            action,
            success: true,
            transaction_hash: Some(transaction_hash),
            invoice_id,
            message: None,
        }
    }

    pub fn failed(action: TransactionAction, invoice_id: Option<u64>, message: impl Into<String>) -> Self {
        TransactionOutcome {
            action,
            success: false,
            transaction_hash: None,
            invoice_id,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub account: Option<Address>,
    pub loading: bool,
    pub last_transaction: Option<TransactionOutcome>,
    pub invoices_by_provider: Vec<Invoice>,
    pub invoices_by_client: Vec<Invoice>,
    pub current_invoice: Option<Invoice>,
    pub error: Option<String>,
    #[serde(skip)]
    in_flight: usize,
}

/// The one place application state lives. Readers get snapshots or a watch
/// receiver; only orchestrator completions write, apart from the two
/// explicit UI clears.
#[derive(Clone)]
pub struct AppStore {
    sender: Arc<watch::Sender<AppState>>,
}

impl Default for AppStore {
    fn default() -> Self {
        AppStore::new()
    }
}

impl AppStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AppState::default());
        AppStore {
            sender: Arc::new(sender),
        }
    }

    pub fn snapshot(&self) -> AppState {
        self.sender.borrow().clone()
    }

    /// Receiver that wakes on every state change, for re-rendering.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.sender.subscribe()
    }

    pub fn clear_transaction(&self) {
        self.sender.send_modify(|state| state.last_transaction = None);
    }

    pub fn clear_error(&self) {
        self.sender.send_modify(|state| state.error = None);
    }

    pub(crate) fn begin_operation(&self) {
        self.sender.send_modify(|state| {
            state.in_flight += 1;
            state.loading = true;
        });
    }

    pub(crate) fn end_operation(&self) {
        self.sender.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.loading = state.in_flight > 0;
        });
    }

    pub(crate) fn set_account(&self, account: Option<Address>) {
        self.sender.send_modify(|state| {
            if state.account != account {
                state.invoices_by_provider.clear();
                state.invoices_by_client.clear();
            }
            state.account = account;
        });
    }

    pub(crate) fn set_invoices(&self, by_provider: Vec<Invoice>, by_client: Vec<Invoice>) {
        self.sender.send_modify(|state| {
            let previous: HashMap<u64, u64> = state
                .invoices_by_provider
                .iter()
                .chain(state.invoices_by_client.iter())
                .map(|invoice| (invoice.id, invoice.curr_milestone))
                .collect();

            for invoice in by_provider.iter().chain(by_client.iter()) {
                if let Some(before) = previous.get(&invoice.id) {
                    if invoice.curr_milestone < *before {
                        tracing::warn!(
                            "Invoice {} milestone cursor went from {} to {}",
                            invoice.id,
                            before,
                            invoice.curr_milestone
                        );
                    }
                }
            }

            state.invoices_by_provider = by_provider;
            state.invoices_by_client = by_client;
        });
    }

    pub(crate) fn set_current_invoice(&self, invoice: Invoice) {
        self.sender.send_modify(|state| state.current_invoice = Some(invoice));
    }

    pub(crate) fn record_transaction(&self, outcome: TransactionOutcome) {
        self.sender.send_modify(|state| state.last_transaction = Some(outcome));
    }

    pub(crate) fn record_error(&self, message: String) {
        self.sender.send_modify(|state| state.error = Some(message));
    }
}
