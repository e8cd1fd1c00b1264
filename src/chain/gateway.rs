use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::abi::{self, IInvoiceFactory, IERC20};
use super::types::{ContractCall, PendingTransaction, RawInvoice, RawReceipt, ReadCall, ReadOutput};
use super::wallet::{TransactionRequest, WalletError, WalletProvider, WalletSubscription};
use crate::core::{network_name, BillBlockError, BillBlockResult};

/// Narrow, already-signed call surface to the invoice contract.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Prompts for account access and returns the selected account.
    async fn connect(&self) -> BillBlockResult<Address>;

    /// Non-interactive: the already-authorized account, if any.
    async fn detect_existing_session(&self) -> BillBlockResult<Option<Address>>;

    async fn submit_transaction(&self, call: ContractCall) -> BillBlockResult<PendingTransaction>;

    async fn await_confirmation(&self, pending: &PendingTransaction) -> BillBlockResult<RawReceipt>;

    async fn read_only_call(&self, call: ReadCall) -> BillBlockResult<ReadOutput>;

    fn subscribe(&self) -> WalletSubscription;

    fn contract_address(&self) -> Address;
}

/// Gateway over an injected wallet: checks the network, signs with the
/// connected account and ABI-encodes every call.
pub struct WalletGateway<W: WalletProvider> {
    wallet: W,
    contract: Address,
    network_id: String,
    account: RwLock<Option<Address>>,
}

impl<W: WalletProvider> WalletGateway<W> {
    pub fn new(wallet: W, contract: Address, network_id: impl Into<String>) -> Self {
        WalletGateway {
            wallet,
            contract,
            network_id: network_id.into(),
            account: RwLock::new(None),
        }
    }

    pub async fn account(&self) -> Option<Address> {
        *self.account.read().await
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    async fn check_network(&self) -> BillBlockResult<()> {
        if !self.wallet.is_available() {
            return Err(BillBlockError::WalletMissing);
        }

        let actual = self.wallet.network_id().await.map_err(handshake_error)?;
        if actual != self.network_id {
            tracing::warn!(
                "Wallet is on network {} but {} is configured",
                actual,
                self.network_id
            );
            return Err(BillBlockError::NetworkMismatch {
                expected: network_name(&self.network_id),
                actual,
            });
        }

        Ok(())
    }

    /// Network check that also drops the remembered account when the wallet
    /// is on the wrong network, so nothing is signed there.
    async fn ensure_network(&self) -> BillBlockResult<()> {
        let checked = self.check_network().await;
        if checked.is_err() {
            *self.account.write().await = None;
        }
        checked
    }

    async fn signer(&self) -> BillBlockResult<Address> {
        if let Some(account) = *self.account.read().await {
            return Ok(account);
        }

        match self.detect_existing_session().await? {
            Some(account) => Ok(account),
            None => Err(BillBlockError::NotConnected),
        }
    }

    async fn eth_call(&self, call: &ReadCall) -> BillBlockResult<Bytes> {
        let (to, data) = abi::encode_read(call, self.contract);
        self.wallet
            .call(to, data)
            .await
            .map_err(|e| BillBlockError::NetworkError(e.to_string()))
    }
}

#[async_trait]
impl<W: WalletProvider> ChainGateway for WalletGateway<W> {
    async fn connect(&self) -> BillBlockResult<Address> {
        self.ensure_network().await?;

        let accounts = self.wallet.request_accounts().await.map_err(handshake_error)?;
        let account = accounts.first().copied().ok_or(BillBlockError::UserRejected)?;

        *self.account.write().await = Some(account);
        tracing::info!("Wallet connected: {}", account);
        Ok(account)
    }

    async fn detect_existing_session(&self) -> BillBlockResult<Option<Address>> {
        self.ensure_network().await?;

        let accounts = self.wallet.accounts().await.map_err(handshake_error)?;
        let account = accounts.first().copied();
        *self.account.write().await = account;
        Ok(account)
    }

    async fn submit_transaction(&self, call: ContractCall) -> BillBlockResult<PendingTransaction> {
        self.ensure_network().await?;
        let from = self.signer().await?;
        let request = TransactionRequest {
            from,
            to: call.target(self.contract),
            data: abi::encode_call(&call),
            value: call.value(),
        };

        let hash = self.wallet.send_transaction(request).await.map_err(|e| match e {
            WalletError::UserRejected => BillBlockError::TransactionRejected,
            WalletError::Reverted(reason) => BillBlockError::TransactionReverted(reason),
            WalletError::Unavailable => BillBlockError::WalletMissing,
            other => BillBlockError::NetworkError(other.to_string()),
        })?;

        tracing::info!("Submitted {} transaction {}", call.label(), hash);
        Ok(PendingTransaction {
            hash,
            label: call.label(),
        })
    }

    async fn await_confirmation(&self, pending: &PendingTransaction) -> BillBlockResult<RawReceipt> {
        let receipt = self.wallet.wait_for_receipt(pending.hash).await.map_err(|e| match e {
            WalletError::Reverted(reason) => BillBlockError::TransactionReverted(reason),
            other => BillBlockError::NetworkError(other.to_string()),
        })?;

        if !receipt.success {
            return Err(BillBlockError::TransactionReverted(format!(
                "{} transaction {} failed",
                pending.label, pending.hash
            )));
        }

        tracing::debug!("{} transaction {} confirmed", pending.label, pending.hash);
        Ok(receipt)
    }

    async fn read_only_call(&self, call: ReadCall) -> BillBlockResult<ReadOutput> {
        let data = self.eth_call(&call).await?;

        let output = match call {
            ReadCall::GetInvoice(_) => {
                let decoded = IInvoiceFactory::getInvoiceCall::abi_decode_returns(&data, true)
                    .map_err(decode_error)?;
                ReadOutput::Invoice(RawInvoice::from(decoded._0))
            }
            ReadCall::InvoicesByProvider(_) => {
                let decoded = IInvoiceFactory::getInvoicesByProviderCall::abi_decode_returns(&data, true)
                    .map_err(decode_error)?;
                ReadOutput::Invoices(decoded._0.into_iter().map(RawInvoice::from).collect())
            }
            ReadCall::InvoicesByClient(_) => {
                let decoded = IInvoiceFactory::getInvoicesByClientCall::abi_decode_returns(&data, true)
                    .map_err(decode_error)?;
                ReadOutput::Invoices(decoded._0.into_iter().map(RawInvoice::from).collect())
            }
            ReadCall::TokenSymbol(_) => {
                let decoded = IERC20::symbolCall::abi_decode_returns(&data, true).map_err(decode_error)?;
                ReadOutput::Symbol(decoded._0)
            }
            ReadCall::TokenDecimals(_) => {
                let decoded = IERC20::decimalsCall::abi_decode_returns(&data, true).map_err(decode_error)?;
                ReadOutput::Decimals(decoded._0)
            }
        };

        Ok(output)
    }

    fn subscribe(&self) -> WalletSubscription {
        self.wallet.subscribe()
    }

    fn contract_address(&self) -> Address {
        self.contract
    }
}

fn handshake_error(error: WalletError) -> BillBlockError {
    match error {
        WalletError::Unavailable => BillBlockError::WalletMissing,
        WalletError::UserRejected => BillBlockError::UserRejected,
        other => BillBlockError::NetworkError(other.to_string()),
    }
}

fn decode_error(error: alloy_sol_types::Error) -> BillBlockError {
    BillBlockError::NetworkError(format!("could not decode contract response: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::wallet::WalletEvent;
    use alloy_primitives::{B256, U256};
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    struct FakeWallet {
        available: bool,
        network: Mutex<String>,
        authorized: Vec<Address>,
        reject_prompt: bool,
        send_error: Option<WalletError>,
        receipt_success: bool,
        sent: Mutex<Vec<TransactionRequest>>,
        events: broadcast::Sender<WalletEvent>,
    }

    impl FakeWallet {
        fn new(network: &str) -> Self {
            let (events, _) = broadcast::channel(8);
            FakeWallet {
                available: true,
                network: Mutex::new(network.to_string()),
                authorized: vec![Address::repeat_byte(0xaa)],
                reject_prompt: false,
                send_error: None,
                receipt_success: true,
                sent: Mutex::new(Vec::new()),
                events,
            }
        }

        fn switch_network(&self, network: &str) {
            *self.network.lock().unwrap() = network.to_string();
        }
    }

    #[async_trait]
    impl WalletProvider for FakeWallet {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn network_id(&self) -> Result<String, WalletError> {
            Ok(self.network.lock().unwrap().clone())
        }

        async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
            if self.reject_prompt {
                return Err(WalletError::UserRejected);
            }
            Ok(self.authorized.clone())
        }

        async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
            Ok(self.authorized.clone())
        }

        async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, WalletError> {
            if let Some(error) = &self.send_error {
                return Err(error.clone());
            }
            self.sent.lock().unwrap().push(request);
            Ok(B256::repeat_byte(0x01))
        }

        async fn wait_for_receipt(&self, hash: B256) -> Result<RawReceipt, WalletError> {
            Ok(RawReceipt {
                transaction_hash: hash,
                success: self.receipt_success,
                logs: Vec::new(),
            })
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, WalletError> {
            Err(WalletError::Transport("connection refused".to_string()))
        }

        fn subscribe(&self) -> WalletSubscription {
            WalletSubscription::new(self.events.subscribe())
        }
    }

    fn contract() -> Address {
        Address::repeat_byte(0xcc)
    }

    #[tokio::test]
    async fn connect_returns_first_account() {
        let gateway = WalletGateway::new(FakeWallet::new("5"), contract(), "5");
        let account = gateway.connect().await.unwrap();
        assert_eq!(account, Address::repeat_byte(0xaa));
        assert_eq!(gateway.account().await, Some(account));
    }

    #[tokio::test]
    async fn connect_without_wallet_fails() {
        let mut wallet = FakeWallet::new("5");
        wallet.available = false;
        let gateway = WalletGateway::new(wallet, contract(), "5");
        assert_eq!(gateway.connect().await, Err(BillBlockError::WalletMissing));
    }

    #[tokio::test]
    async fn connect_on_wrong_network_fails() {
        let gateway = WalletGateway::new(FakeWallet::new("1"), contract(), "5");
        let err = gateway.connect().await.unwrap_err();
        assert_eq!(
            err,
            BillBlockError::NetworkMismatch {
                expected: "Goerli testnet".to_string(),
                actual: "1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn dismissed_prompt_is_user_rejected() {
        let mut wallet = FakeWallet::new("5");
        wallet.reject_prompt = true;
        let gateway = WalletGateway::new(wallet, contract(), "5");
        assert_eq!(gateway.connect().await, Err(BillBlockError::UserRejected));
    }

    #[tokio::test]
    async fn existing_session_is_none_when_not_authorized() {
        let mut wallet = FakeWallet::new("5");
        wallet.authorized.clear();
        let gateway = WalletGateway::new(wallet, contract(), "5");
        assert_eq!(gateway.detect_existing_session().await, Ok(None));
    }

    #[tokio::test]
    async fn existing_session_also_checks_network() {
        let gateway = WalletGateway::new(FakeWallet::new("1"), contract(), "5");
        assert!(matches!(
            gateway.detect_existing_session().await,
            Err(BillBlockError::NetworkMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn deposit_is_sent_to_contract_with_value() {
        let gateway = WalletGateway::new(FakeWallet::new("5"), contract(), "5");
        gateway.connect().await.unwrap();

        let call = ContractCall::Deposit {
            invoice_id: 4,
            token: Address::ZERO,
            amounts: vec![U256::from(100u64)],
            is_erc721: false,
            value: U256::from(100u64),
        };
        let pending = gateway.submit_transaction(call).await.unwrap();
        assert_eq!(pending.label, "deposit");

        let sent = gateway.wallet().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, contract());
        assert_eq!(sent[0].from, Address::repeat_byte(0xaa));
        assert_eq!(sent[0].value, U256::from(100u64));
    }

    #[tokio::test]
    async fn declined_signature_is_transaction_rejected() {
        let mut wallet = FakeWallet::new("5");
        wallet.send_error = Some(WalletError::UserRejected);
        let gateway = WalletGateway::new(wallet, contract(), "5");

        let call = ContractCall::Release {
            invoice_id: 1,
            release_until: 1,
        };
        assert_eq!(
            gateway.submit_transaction(call).await,
            Err(BillBlockError::TransactionRejected)
        );
    }

    #[tokio::test]
    async fn failed_receipt_is_transaction_reverted() {
        let mut wallet = FakeWallet::new("5");
        wallet.receipt_success = false;
        let gateway = WalletGateway::new(wallet, contract(), "5");

        let pending = PendingTransaction {
            hash: B256::repeat_byte(0x02),
            label: "release",
        };
        assert!(matches!(
            gateway.await_confirmation(&pending).await,
            Err(BillBlockError::TransactionReverted(_))
        ));
    }

    #[tokio::test]
    async fn read_failure_is_network_error() {
        let gateway = WalletGateway::new(FakeWallet::new("5"), contract(), "5");
        assert!(matches!(
            gateway.read_only_call(ReadCall::GetInvoice(1)).await,
            Err(BillBlockError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn nothing_is_signed_after_switching_to_another_network() {
        let gateway = WalletGateway::new(FakeWallet::new("5"), contract(), "5");
        gateway.connect().await.unwrap();

        gateway.wallet().switch_network("1");
        let call = ContractCall::Release {
            invoice_id: 2,
            release_until: 1,
        };
        assert!(matches!(
            gateway.submit_transaction(call).await,
            Err(BillBlockError::NetworkMismatch { .. })
        ));
        assert!(gateway.wallet().sent.lock().unwrap().is_empty());
        assert_eq!(gateway.account().await, None);
    }

    #[tokio::test]
    async fn session_check_on_wrong_network_forgets_the_account() {
        let gateway = WalletGateway::new(FakeWallet::new("5"), contract(), "5");
        gateway.connect().await.unwrap();

        gateway.wallet().switch_network("1");
        assert!(gateway.detect_existing_session().await.is_err());
        assert_eq!(gateway.account().await, None);

        gateway.wallet().switch_network("5");
        assert_eq!(
            gateway.detect_existing_session().await,
            Ok(Some(Address::repeat_byte(0xaa)))
        );
    }

    #[tokio::test]
    async fn submitting_without_an_account_is_not_connected() {
        let mut wallet = FakeWallet::new("5");
        wallet.authorized.clear();
        let gateway = WalletGateway::new(wallet, contract(), "5");

        let call = ContractCall::Withdraw {
            token_id: U256::from(1u64),
            balance: U256::from(1u64),
        };
        assert_eq!(
            gateway.submit_transaction(call).await,
            Err(BillBlockError::NotConnected)
        );
    }
}
