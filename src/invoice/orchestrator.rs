use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use tokio::sync::RwLock;

use super::translator::{translate, TokenInfo};
use super::units::{checked_sum, to_base_units, ETH_DECIMALS};
use super::validation::{validate_draft, DraftAsset, TokenInput, ValidatedDraft};
use crate::app::{AppStore, TransactionAction, TransactionOutcome};
use crate::chain::abi::created_invoice_id;
use crate::chain::{ChainGateway, ContractCall, RawInvoice, RawReceipt, ReadCall, WalletEvent, WalletSubscription};
use crate::core::{BillBlockError, BillBlockResult};
use crate::invoice::tokens::TokenTable;
use crate::models::{Invoice, InvoiceAsset, InvoiceDraft, InvoiceMetadata, TokenType};
use crate::storage::MetadataCache;

/// Runs the create / pay / release / withdraw / fetch flows against the
/// chain gateway and mirrors their results into the [`AppStore`].
pub struct InvoiceOrchestrator {
    gateway: Arc<dyn ChainGateway>,
    cache: MetadataCache,
    store: AppStore,
    network_id: String,
    token_table: TokenTable,
    decimals: RwLock<HashMap<Address, u8>>,
    symbols: RwLock<HashMap<Address, Option<String>>>,
}

impl InvoiceOrchestrator {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        cache: MetadataCache,
        store: AppStore,
        network_id: impl Into<String>,
        token_table: TokenTable,
    ) -> Self {
        InvoiceOrchestrator {
            gateway,
            cache,
            store,
            network_id: network_id.into(),
            token_table,
            decimals: RwLock::new(HashMap::new()),
            symbols: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &AppStore {
        &self.store
    }

    /// Flow boundary. Keeps `loading` set while `flow` runs and records any
    /// failure as the user-visible error.
    async fn run<T, F>(&self, operation: &str, flow: F) -> BillBlockResult<T>
    where
        F: Future<Output = BillBlockResult<T>>,
    {
        self.store.begin_operation();
        tracing::info!("{} started", operation);

        let result = flow.await;
        match &result {
            Ok(_) => tracing::info!("{} finished", operation),
            Err(e) => {
                tracing::error!("{} failed: {}", operation, e);
                self.store.record_error(e.to_string());
            }
        }

        self.store.end_operation();
        result
    }

    /// Records the outcome of a transaction flow and refreshes the dashboard
    /// so the store mirrors whatever the contract now reports.
    async fn finish_transaction(
        &self,
        action: TransactionAction,
        invoice_id: Option<u64>,
        result: BillBlockResult<RawReceipt>,
    ) -> BillBlockResult<TransactionOutcome> {
        match result {
            Ok(receipt) => {
                let outcome = TransactionOutcome::succeeded(action, receipt.transaction_hash, invoice_id);
                self.store.record_transaction(outcome.clone());
                self.refresh().await;
                Ok(outcome)
            }
            Err(e) => {
                self.store
                    .record_transaction(TransactionOutcome::failed(action, invoice_id, e.to_string()));
                Err(e)
            }
        }
    }

    async fn refresh(&self) {
        let Some(account) = self.store.snapshot().account else {
            return;
        };
        if let Err(e) = self.load_invoices(account).await {
            tracing::warn!("Could not refresh invoices for {}: {}", account, e);
        }
    }

    pub async fn connect(&self) -> BillBlockResult<Address> {
        self.run("connect", async {
            let account = self.gateway.connect().await?;
            self.store.set_account(Some(account));
            self.load_invoices(account).await?;
            Ok(account)
        })
        .await
    }

    /// Picks up an already-authorized wallet without prompting.
    pub async fn init_session(&self) -> BillBlockResult<Option<Address>> {
        self.run("init session", async {
            let account = match self.gateway.detect_existing_session().await {
                Ok(account) => account,
                Err(e) => {
                    self.store.set_account(None);
                    return Err(e);
                }
            };
            self.store.set_account(account);
            if let Some(account) = account {
                self.load_invoices(account).await?;
            }
            Ok(account)
        })
        .await
    }

    pub async fn handle_wallet_event(&self, event: WalletEvent) -> BillBlockResult<()> {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                tracing::info!("Wallet accounts changed");
                match accounts.first().copied() {
                    Some(account) => {
                        self.store.set_account(Some(account));
                        self.fetch_invoices(account).await.map(|_| ())
                    }
                    None => {
                        self.store.set_account(None);
                        Ok(())
                    }
                }
            }
            WalletEvent::ChainChanged(network) => {
                tracing::info!("Wallet switched to network {}", network);
                self.init_session().await.map(|_| ())
            }
        }
    }

    /// Feeds wallet notifications into the orchestrator until the
    /// subscription is closed.
    pub async fn watch_wallet(&self, mut subscription: WalletSubscription) {
        while let Some(event) = subscription.next().await {
            if let Err(e) = self.handle_wallet_event(event).await {
                tracing::warn!("Wallet event handling failed: {}", e);
            }
        }
    }

    pub async fn create_invoice(&self, draft: InvoiceDraft) -> BillBlockResult<u64> {
        self.run("create invoice", async {
            let validated = validate_draft(&draft)?;
            let (call, metadata) = self.prepare_create(&validated).await?;

            let contract = self.gateway.contract_address();
            let confirmed = self.submit_and_confirm(call).await.and_then(|receipt| {
                created_invoice_id(&receipt, contract)
                    .map(|invoice_id| (receipt, invoice_id))
                    .ok_or(BillBlockError::InvoiceIdMissing)
            });
            let (receipt, invoice_id) = match confirmed {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    self.store
                        .record_transaction(TransactionOutcome::failed(TransactionAction::Create, None, e.to_string()));
                    return Err(e);
                }
            };

            if let Err(e) = self.cache.set(invoice_id, &metadata).await {
                tracing::warn!("Invoice {} created but its metadata was not cached: {}", invoice_id, e);
            }

            self.finish_transaction(TransactionAction::Create, Some(invoice_id), Ok(receipt))
                .await?;
            Ok(invoice_id)
        })
        .await
    }

    async fn prepare_create(&self, draft: &ValidatedDraft) -> BillBlockResult<(ContractCall, InvoiceMetadata)> {
        let (token, symbol, amounts, is_erc721) = match &draft.asset {
            DraftAsset::Eth { amount } => {
                let amounts = schedule(amount, &draft.milestones, ETH_DECIMALS)?;
                (Address::ZERO, "ETH".to_string(), amounts, false)
            }
            DraftAsset::Erc20 { token, amount } => {
                let (address, symbol) = self.resolve_token(token).await?;
                let decimals = self.token_decimals(address).await;
                let amounts = schedule(amount, &draft.milestones, decimals)?;
                (address, symbol, amounts, false)
            }
            DraftAsset::Erc721 { token, token_id } => {
                let (address, symbol) = self.resolve_token(token).await?;
                (address, symbol, vec![*token_id], true)
            }
        };

        let due_date = draft
            .due_date
            .and_hms_opt(0, 0, 0)
            .map(|moment| moment.and_utc().timestamp())
            .and_then(|seconds| u64::try_from(seconds).ok())
            .ok_or_else(|| BillBlockError::invalid_input("due date is out of range"))?;

        let call = ContractCall::CreateInvoice {
            provider: draft.provider,
            client: draft.client,
            token,
            amounts,
            due_date,
            is_erc721,
        };

        let metadata = InvoiceMetadata {
            item_name: draft.item_name.clone(),
            item_description: draft.item_description.clone(),
            date: draft.date,
            token_symbol: Some(symbol),
            milestones: draft.milestones.clone(),
        };

        Ok((call, metadata))
    }

    /// Fills in whichever of symbol / address the user did not give.
    async fn resolve_token(&self, token: &TokenInput) -> BillBlockResult<(Address, String)> {
        match (token.address, token.symbol.as_deref()) {
            (Some(address), Some(symbol)) => {
                let known = match self.token_table.address_of(&self.network_id, symbol) {
                    Some(listed) => listed == address,
                    None => self
                        .read_symbol(address)
                        .await?
                        .eq_ignore_ascii_case(symbol),
                };
                if !known {
                    return Err(BillBlockError::InvalidToken(format!(
                        "{} is not the {} token on this network",
                        address, symbol
                    )));
                }
                Ok((address, symbol.to_uppercase()))
            }
            (None, Some(symbol)) => self
                .token_table
                .address_of(&self.network_id, symbol)
                .map(|address| (address, symbol.to_uppercase()))
                .ok_or_else(|| {
                    BillBlockError::InvalidToken(format!(
                        "no known {} token on this network",
                        symbol
                    ))
                }),
            (Some(address), None) => Ok((address, self.read_symbol(address).await?)),
            (None, None) => Err(BillBlockError::InvalidToken(
                "token symbol or token address is required".to_string(),
            )),
        }
    }

    async fn read_symbol(&self, token: Address) -> BillBlockResult<String> {
        self.gateway
            .read_only_call(ReadCall::TokenSymbol(token))
            .await
            .and_then(|output| output.into_symbol())
            .map_err(|e| BillBlockError::InvalidToken(format!("could not read the symbol of {}: {}", token, e)))
    }

    async fn token_decimals(&self, token: Address) -> u8 {
        if let Some(decimals) = self.decimals.read().await.get(&token) {
            return *decimals;
        }

        let decimals = match self
            .gateway
            .read_only_call(ReadCall::TokenDecimals(token))
            .await
            .and_then(|output| output.into_decimals())
        {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::warn!("Could not read decimals of {}, assuming 18: {}", token, e);
                return ETH_DECIMALS;
            }
        };

        self.decimals.write().await.insert(token, decimals);
        decimals
    }

    async fn token_symbol(&self, token: Address) -> Option<String> {
        if let Some(symbol) = self.symbols.read().await.get(&token) {
            return symbol.clone();
        }

        let symbol = match self.token_table.symbol_of(&self.network_id, token) {
            Some(symbol) => Some(symbol),
            None => match self
                .gateway
                .read_only_call(ReadCall::TokenSymbol(token))
                .await
                .and_then(|output| output.into_symbol())
            {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    tracing::debug!("No symbol for {}: {}", token, e);
                    None
                }
            },
        };

        self.symbols.write().await.insert(token, symbol.clone());
        symbol
    }

    async fn submit_and_confirm(&self, call: ContractCall) -> BillBlockResult<RawReceipt> {
        let pending = self.gateway.submit_transaction(call).await?;
        self.gateway.await_confirmation(&pending).await
    }

    /// ETH: one deposit carrying the value. ERC20/ERC721: an approval that
    /// must confirm before the deposit is submitted.
    pub async fn pay_invoice(&self, invoice: &Invoice) -> BillBlockResult<TransactionOutcome> {
        self.run("pay invoice", async {
            let result = match self.payment_calls(invoice) {
                Ok((approval, deposit)) => self.approve_then_deposit(approval, deposit).await,
                Err(e) => Err(e),
            };
            self.finish_transaction(TransactionAction::Pay, Some(invoice.id), result)
                .await
        })
        .await
    }

    fn payment_calls(&self, invoice: &Invoice) -> BillBlockResult<(Option<ContractCall>, ContractCall)> {
        let spender = self.gateway.contract_address();

        let calls = match &invoice.asset {
            InvoiceAsset::Eth { amount } => {
                let amounts = schedule(amount, &invoice.milestones, ETH_DECIMALS)?;
                let value = checked_sum(&amounts)
                    .ok_or_else(|| BillBlockError::invalid_input("payment amount overflows"))?;
                let deposit = ContractCall::Deposit {
                    invoice_id: invoice.id,
                    token: Address::ZERO,
                    amounts,
                    is_erc721: false,
                    value,
                };
                (None, deposit)
            }
            InvoiceAsset::Erc20 {
                token_address,
                decimals,
                amount,
                ..
            } => {
                let amounts = schedule(amount, &invoice.milestones, *decimals)?;
                let total = checked_sum(&amounts)
                    .ok_or_else(|| BillBlockError::invalid_input("payment amount overflows"))?;
                let approval = ContractCall::ApproveErc20 {
                    token: *token_address,
                    spender,
                    amount: total,
                };
                let deposit = ContractCall::Deposit {
                    invoice_id: invoice.id,
                    token: *token_address,
                    amounts,
                    is_erc721: false,
                    value: U256::ZERO,
                };
                (Some(approval), deposit)
            }
            InvoiceAsset::Erc721 {
                token_address,
                token_id,
                ..
            } => {
                let approval = ContractCall::ApproveErc721 {
                    token: *token_address,
                    spender,
                    token_id: *token_id,
                };
                let deposit = ContractCall::Deposit {
                    invoice_id: invoice.id,
                    token: *token_address,
                    amounts: vec![*token_id],
                    is_erc721: true,
                    value: U256::ZERO,
                };
                (Some(approval), deposit)
            }
        };

        Ok(calls)
    }

    async fn approve_then_deposit(
        &self,
        approval: Option<ContractCall>,
        deposit: ContractCall,
    ) -> BillBlockResult<RawReceipt> {
        if let Some(approval) = approval {
            self.submit_and_confirm(approval).await?;
        }
        self.submit_and_confirm(deposit).await
    }

    /// Releases escrow up to (exclusive) milestone `release_until`. Invoices
    /// without milestones always release everything. Regressions are left for
    /// the contract to reject.
    pub async fn release_funds(&self, invoice: &Invoice, release_until: u64) -> BillBlockResult<TransactionOutcome> {
        self.run("release funds", async {
            let release_until = if invoice.has_milestones() { release_until } else { 1 };
            let call = ContractCall::Release {
                invoice_id: invoice.id,
                release_until,
            };
            let result = self.submit_and_confirm(call).await;
            self.finish_transaction(TransactionAction::Release, Some(invoice.id), result)
                .await
        })
        .await
    }

    pub async fn withdraw(&self, token_id: U256, balance: U256) -> BillBlockResult<TransactionOutcome> {
        self.run("withdraw", async {
            let result = self
                .submit_and_confirm(ContractCall::Withdraw { token_id, balance })
                .await;
            self.finish_transaction(TransactionAction::Withdraw, None, result)
                .await
        })
        .await
    }

    /// Loads the invoices `address` issued and the ones it owes.
    pub async fn fetch_invoices(&self, address: Address) -> BillBlockResult<(Vec<Invoice>, Vec<Invoice>)> {
        self.run("fetch invoices", self.load_invoices(address)).await
    }

    async fn load_invoices(&self, address: Address) -> BillBlockResult<(Vec<Invoice>, Vec<Invoice>)> {
        let by_provider = self
            .gateway
            .read_only_call(ReadCall::InvoicesByProvider(address))
            .await?
            .into_invoices()?;
        let by_client = self
            .gateway
            .read_only_call(ReadCall::InvoicesByClient(address))
            .await?
            .into_invoices()?;

        let by_provider = self.hydrate_all(&by_provider).await?;
        let by_client = self.hydrate_all(&by_client).await?;

        self.store.set_invoices(by_provider.clone(), by_client.clone());
        Ok((by_provider, by_client))
    }

    /// Single invoice, e.g. for the shareable pay page.
    pub async fn fetch_invoice(&self, invoice_id: u64) -> BillBlockResult<Invoice> {
        self.run("fetch invoice", async {
            let raw = self
                .gateway
                .read_only_call(ReadCall::GetInvoice(invoice_id))
                .await?
                .into_invoice()?;
            let invoice = self.hydrate(&raw).await?;
            self.store.set_current_invoice(invoice.clone());
            Ok(invoice)
        })
        .await
    }

    async fn hydrate_all(&self, raws: &[RawInvoice]) -> BillBlockResult<Vec<Invoice>> {
        let mut invoices = Vec::with_capacity(raws.len());
        for raw in raws {
            invoices.push(self.hydrate(raw).await?);
        }
        Ok(invoices)
    }

    async fn hydrate(&self, raw: &RawInvoice) -> BillBlockResult<Invoice> {
        let metadata = match u64::try_from(raw.id) {
            Ok(id) => match self.cache.get(id).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable metadata for invoice {}: {}", id, e);
                    None
                }
            },
            Err(_) => None,
        };

        let token = match TokenType::from_chain(raw.token, raw.is_erc721) {
            TokenType::Eth => TokenInfo::default(),
            TokenType::Erc20 => TokenInfo {
                symbol: self.cached_or_chain_symbol(metadata.as_ref(), raw.token).await,
                decimals: self.token_decimals(raw.token).await,
            },
            TokenType::Erc721 => TokenInfo {
                symbol: self.cached_or_chain_symbol(metadata.as_ref(), raw.token).await,
                decimals: 0,
            },
        };

        translate(raw, metadata.as_ref(), &token)
    }

    async fn cached_or_chain_symbol(&self, metadata: Option<&InvoiceMetadata>, token: Address) -> Option<String> {
        match metadata.and_then(|m| m.token_symbol.clone()) {
            Some(symbol) => Some(symbol),
            None => self.token_symbol(token).await,
        }
    }
}

/// Base-unit amounts sent to the contract: one per milestone, or the total.
fn schedule(
    amount: &str,
    milestones: &[crate::models::Milestone],
    decimals: u8,
) -> BillBlockResult<Vec<U256>> {
    let total = to_base_units(amount, decimals)?;
    if total == U256::ZERO {
        return Err(BillBlockError::invalid_input(format!(
            "amount {} is below the token's precision",
            amount
        )));
    }

    if milestones.is_empty() {
        return Ok(vec![total]);
    }

    let amounts = milestones
        .iter()
        .map(|milestone| to_base_units(&milestone.amount, decimals))
        .collect::<BillBlockResult<Vec<_>>>()?;

    if checked_sum(&amounts) != Some(total) {
        return Err(BillBlockError::invalid_input(
            "milestone amounts must add up to the invoice amount",
        ));
    }

    Ok(amounts)
}
