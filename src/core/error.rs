use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BillBlockError {
    #[error("Please install a browser wallet such as Metamask")]
    WalletMissing,

    #[error("Unsupported network. Please make sure that you are on {expected}.")]
    NetworkMismatch { expected: String, actual: String },

    #[error("Wallet access request was rejected")]
    UserRejected,

    #[error("No wallet account is connected. Connect your wallet first.")]
    NotConnected,

    #[error("Transaction was rejected in the wallet")]
    TransactionRejected,

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid invoice: {}", .0.join("; "))]
    InvalidInput(Vec<String>),

    #[error("Transaction receipt does not contain the created invoice id")]
    InvoiceIdMissing,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Metadata cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BillBlockError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        BillBlockError::InvalidInput(vec![message.into()])
    }
}

impl From<redis::RedisError> for BillBlockError {
    fn from(error: redis::RedisError) -> Self {
        BillBlockError::Cache(error.to_string())
    }
}

impl From<serde_json::Error> for BillBlockError {
    fn from(error: serde_json::Error) -> Self {
        BillBlockError::Cache(error.to_string())
    }
}

pub type BillBlockResult<T> = Result<T, BillBlockError>;
