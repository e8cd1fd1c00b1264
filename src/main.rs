use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use billblock::app::{available_action, pay_prompt, payment_link};
use billblock::chain::{ChainGateway, JsonRpcWallet, WalletGateway};
use billblock::{AppConfig, AppStore, InvoiceDraft, InvoiceOrchestrator, MetadataCache, Milestone, TokenType};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "billblock", about = "Create, pay and settle on-chain invoices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the wallet for account access and load the dashboard
    Connect,
    /// Show invoices issued by and owed by the connected account
    Dashboard,
    /// Show a single invoice with its payment link
    Invoice { id: u64 },
    /// Create a new invoice
    Create(CreateArgs),
    /// Pay an invoice as its client
    Pay { id: u64 },
    /// Release escrowed funds up to (exclusive) milestone `until`
    Release { id: u64, until: u64 },
    /// Withdraw a balance held by the invoice contract
    Withdraw { token_id: U256, balance: U256 },
    /// Follow wallet account and network changes until interrupted
    Watch,
}

#[derive(clap::Args)]
struct CreateArgs {
    #[arg(long)]
    provider: Address,
    #[arg(long)]
    client: Address,
    #[arg(long)]
    date: NaiveDate,
    #[arg(long)]
    due_date: NaiveDate,
    #[arg(long)]
    item_name: String,
    #[arg(long)]
    description: Option<String>,
    /// eth, erc20 or erc721
    #[arg(long, value_parser = parse_token_type)]
    token_type: TokenType,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long)]
    token_id: Option<String>,
    #[arg(long)]
    token_symbol: Option<String>,
    #[arg(long)]
    token_address: Option<String>,
    /// NAME=AMOUNT, repeatable
    #[arg(long = "milestone", value_parser = parse_milestone)]
    milestones: Vec<Milestone>,
}

impl From<CreateArgs> for InvoiceDraft {
    fn from(args: CreateArgs) -> Self {
        InvoiceDraft {
            provider_address: args.provider.to_string(),
            client_address: args.client.to_string(),
            date: Some(args.date),
            due_date: Some(args.due_date),
            item_name: args.item_name,
            item_description: args.description,
            token_type: Some(args.token_type),
            amount: args.amount,
            token_id: args.token_id,
            token_symbol: args.token_symbol,
            token_address: args.token_address,
            milestones: args.milestones,
        }
    }
}

fn parse_token_type(raw: &str) -> Result<TokenType, String> {
    match raw.to_ascii_lowercase().as_str() {
        "eth" => Ok(TokenType::Eth),
        "erc20" => Ok(TokenType::Erc20),
        "erc721" => Ok(TokenType::Erc721),
        other => Err(format!("unknown token type {}", other)),
    }
}

fn parse_milestone(raw: &str) -> Result<Milestone, String> {
    raw.split_once('=')
        .map(|(name, amount)| Milestone::new(name.trim(), amount.trim()))
        .ok_or_else(|| format!("expected NAME=AMOUNT, got {}", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;

    tracing::info!(
        "Using invoice contract {} on {}",
        config.contract_address,
        config.network_name()
    );

    let wallet = JsonRpcWallet::new(config.rpc_url.clone(), config.receipt_poll_interval);
    let gateway = Arc::new(WalletGateway::new(
        wallet,
        config.contract_address,
        config.network_id.clone(),
    ));
    let cache = MetadataCache::from_config(&config).await?;
    let orchestrator = InvoiceOrchestrator::new(
        gateway.clone(),
        cache,
        AppStore::new(),
        config.network_id.clone(),
        config.token_table.clone(),
    );

    if let Commands::Connect = cli.command {
        orchestrator.connect().await?;
        return print_json(&orchestrator.store().snapshot());
    }

    let account = orchestrator.init_session().await?;

    match cli.command {
        Commands::Connect => {}
        Commands::Dashboard => {
            if account.is_none() {
                anyhow::bail!("No connected account. Run `billblock connect` first.");
            }
            print_json(&orchestrator.store().snapshot())?;
        }
        Commands::Invoice { id } => {
            let invoice = orchestrator.fetch_invoice(id).await?;
            let action = available_action(invoice.status, account == Some(invoice.provider_address));
            print_json(&serde_json::json!({
                "invoice": invoice,
                "action": action,
                "paymentLink": payment_link(&config.base_url, id),
            }))?;
        }
        Commands::Create(args) => {
            let id = orchestrator.create_invoice(args.into()).await?;
            print_json(&serde_json::json!({
                "invoiceId": id,
                "paymentLink": payment_link(&config.base_url, id),
            }))?;
        }
        Commands::Pay { id } => {
            let invoice = orchestrator.fetch_invoice(id).await?;
            eprintln!("{}", pay_prompt(&invoice));
            print_json(&orchestrator.pay_invoice(&invoice).await?)?;
        }
        Commands::Release { id, until } => {
            let invoice = orchestrator.fetch_invoice(id).await?;
            print_json(&orchestrator.release_funds(&invoice, until).await?)?;
        }
        Commands::Withdraw { token_id, balance } => {
            print_json(&orchestrator.withdraw(token_id, balance).await?)?;
        }
        Commands::Watch => {
            let subscription = gateway.subscribe();
            tokio::select! {
                _ = orchestrator.watch_wallet(subscription) => {}
                _ = gateway.wallet().watch_changes() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Stopped watching wallet");
                }
            }
            print_json(&orchestrator.store().snapshot())?;
        }
    }

    Ok(())
}
