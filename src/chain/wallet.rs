use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use super::types::RawReceipt;

/// EIP-1193 code for "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("no wallet is available")]
    Unavailable,

    #[error("user rejected the request")]
    UserRejected,

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl WalletError {
    /// Classifies a JSON-RPC error object the way browser wallets report them.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == USER_REJECTED_CODE {
            WalletError::UserRejected
        } else if code == 3 || message.to_lowercase().contains("revert") {
            WalletError::Reverted(message)
        } else {
            WalletError::Rpc { code, message }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Notifications pushed by the wallet extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(String),
}

/// Live subscription to wallet events. Dropping it, or calling
/// [`WalletSubscription::unsubscribe`], detaches from the wallet.
pub struct WalletSubscription {
    receiver: Option<broadcast::Receiver<WalletEvent>>,
}

impl WalletSubscription {
    pub fn new(receiver: broadcast::Receiver<WalletEvent>) -> Self {
        WalletSubscription {
            receiver: Some(receiver),
        }
    }

    /// Waits for the next event. Returns `None` once unsubscribed or when the
    /// wallet side has gone away. Lagged events are skipped.
    pub async fn next(&mut self) -> Option<WalletEvent> {
        loop {
            let receiver = self.receiver.as_mut()?;
            let received = receiver.recv().await;
            match received {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Wallet subscription lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.receiver = None;
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

/// The injected wallet as the page sees it.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a compatible wallet extension is present at all.
    fn is_available(&self) -> bool;

    async fn network_id(&self) -> Result<String, WalletError>;

    /// Prompts the user for account access.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Accounts already authorized for this origin, no prompt.
    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, WalletError>;

    /// Resolves once the transaction is mined.
    async fn wait_for_receipt(&self, hash: B256) -> Result<RawReceipt, WalletError>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError>;

    fn subscribe(&self) -> WalletSubscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rpc_errors() {
        assert_eq!(WalletError::from_rpc(4001, "User denied"), WalletError::UserRejected);
        assert_eq!(
            WalletError::from_rpc(3, "execution reverted: not provider"),
            WalletError::Reverted("execution reverted: not provider".to_string())
        );
        assert_eq!(
            WalletError::from_rpc(-32000, "VM Exception while processing transaction: revert"),
            WalletError::Reverted("VM Exception while processing transaction: revert".to_string())
        );
        assert!(matches!(
            WalletError::from_rpc(-32603, "internal error"),
            WalletError::Rpc { code: -32603, .. }
        ));
    }

    #[tokio::test]
    async fn subscription_delivers_until_unsubscribed() {
        let (sender, receiver) = broadcast::channel(4);
        let mut subscription = WalletSubscription::new(receiver);

        sender.send(WalletEvent::ChainChanged("5".to_string())).unwrap();
        assert_eq!(
            subscription.next().await,
            Some(WalletEvent::ChainChanged("5".to_string()))
        );

        subscription.unsubscribe();
        assert!(!subscription.is_active());
        let _ = sender.send(WalletEvent::AccountsChanged(Vec::new()));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn subscription_ends_when_wallet_drops() {
        let (sender, receiver) = broadcast::channel(4);
        let mut subscription = WalletSubscription::new(receiver);
        drop(sender);
        assert_eq!(subscription.next().await, None);
        assert!(!subscription.is_active());
    }
}
