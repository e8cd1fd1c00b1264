pub mod abi;
pub mod gateway;
pub mod rpc;
pub mod types;
pub mod wallet;

pub use gateway::{ChainGateway, WalletGateway};
pub use rpc::JsonRpcWallet;
pub use types::*;
pub use wallet::{TransactionRequest, WalletError, WalletEvent, WalletProvider, WalletSubscription};
