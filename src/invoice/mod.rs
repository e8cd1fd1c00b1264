pub mod orchestrator;
pub mod tokens;
pub mod translator;
pub mod units;
pub mod validation;

pub use orchestrator::InvoiceOrchestrator;
pub use tokens::TokenTable;
pub use translator::{translate, TokenInfo};
pub use validation::{validate_draft, ValidatedDraft};
