pub mod presentation;
pub mod state;

pub use presentation::{available_action, display_amount, pay_prompt, payment_link, InvoiceAction};
pub use state::{AppState, AppStore, TransactionAction, TransactionOutcome};
