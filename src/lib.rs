pub mod app;
pub mod chain;
pub mod core;
pub mod invoice;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use app::{AppState, AppStore, TransactionOutcome};
pub use chain::{ChainGateway, JsonRpcWallet, WalletGateway, WalletProvider};
pub use crate::core::{AppConfig, BillBlockError, BillBlockResult};
pub use invoice::{InvoiceOrchestrator, TokenTable};
pub use models::{Invoice, InvoiceAsset, InvoiceDraft, InvoiceMetadata, InvoiceStatus, Milestone, TokenType};
pub use storage::MetadataCache;
