//! Pegaso - Vault Client
//!
//! Command line front end for the yield vaults: wallet session, vault
//! positions, deposits and withdrawals, swaps through the AMM router, spot
//! price and the local activity log.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pegaso::activity::{merge_activity, ActivityKind, DEFAULT_ACTIVITY_LIMIT};
use pegaso::config::{Config, ENV_SECRET_KEY};
use pegaso::format::{explorer_url, format_address, format_balance, short_hash};
use pegaso::metrics::LifecycleMetrics;
use pegaso::price::PriceClient;
use pegaso::rpc::{HorizonClient, JsonRpcContractClient, LedgerQuery};
use pegaso::session::SessionManager;
use pegaso::storage::LocalStore;
use pegaso::swap::{SwapClient, SwapPathResolver};
use pegaso::tx_builder::{LifecycleError, TxLifecycle, TxOutcome};
use pegaso::types::{Address, VaultConfig, VaultRegistry};
use pegaso::vault::{
    display_or_zero, is_uninitialized_error, pool_apy, token_symbol, VaultClient,
    UNINITIALIZED_HINT,
};
use pegaso::wallet::LocalKeyWallet;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "pegaso.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the Prometheus metrics of this run before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect the local wallet and remember the session
    Connect,
    /// Forget the wallet session
    Disconnect,
    /// Connected account, balance and recent activity
    Status,
    /// List the vault table with positions when connected
    Vaults,
    /// Position in one vault
    Position {
        #[arg(long)]
        vault: Option<String>,
    },
    /// Deposit into a vault
    Deposit {
        #[arg(long)]
        vault: Option<String>,
        #[arg(long)]
        amount: String,
    },
    /// Withdraw from a vault
    Withdraw {
        #[arg(long)]
        vault: Option<String>,
        #[arg(long)]
        amount: String,
    },
    /// Initialize a freshly deployed vault with its pool and asset
    Init {
        #[arg(long)]
        vault: String,
    },
    /// Swap between router tokens (strict send)
    Swap {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },
    /// Spot price from the price API
    Price {
        #[arg(long)]
        asset: Option<String>,
    },
    /// Ledger payments merged with locally recorded vault operations
    History {
        #[arg(long, default_value_t = DEFAULT_ACTIVITY_LIMIT)]
        limit: usize,
    },
    /// Latest ledger statistics and the client metrics of this run
    Metrics,
}

/// Long-lived clients shared by the commands
struct App {
    config: Config,
    registry: VaultRegistry,
    store: LocalStore,
    ledger: Arc<HorizonClient>,
    metrics: Arc<LifecycleMetrics>,
    lifecycle: Arc<TxLifecycle>,
    session: SessionManager,
    vaults: VaultClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json)?;

    info!("🚀 Starting Pegaso vault client");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 Received interrupt, cancelling");
                cancel.cancel();
            }
        });
    }

    // Price lookups need neither wallet nor ledger
    if let Command::Price { asset } = &args.command {
        return show_price(&config, asset.as_deref()).await;
    }

    let app = build_app(config)?;
    let result = run_command(&app, args.command, &cancel).await;

    if args.print_metrics {
        println!("{}", app.metrics.gather_text()?);
    }
    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "pegaso=debug,info"
    } else {
        "pegaso=info,warn,error"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Ok(Config::from_env())
    }
}

/// Secret seed from the environment, else the configured key file
fn load_wallet(config: &Config) -> Result<LocalKeyWallet> {
    if let Ok(seed) = std::env::var(ENV_SECRET_KEY) {
        return LocalKeyWallet::from_seed_hex(seed.trim())
            .with_context(|| format!("Invalid {}", ENV_SECRET_KEY));
    }
    info!("🔑 Loading wallet from: {}", config.wallet.key_path);
    LocalKeyWallet::from_file(&config.wallet.key_path).context("Failed to load wallet")
}

fn build_app(config: Config) -> Result<App> {
    let timeout = config.request_timeout();
    let wallet = Arc::new(load_wallet(&config)?);
    info!("💼 Wallet address: {}", wallet.address());

    info!("🌐 Horizon: {}", config.network.horizon_url);
    let horizon = Arc::new(HorizonClient::new(config.network.horizon_url.clone(), timeout)?);
    info!("🌐 Contract RPC: {}", config.network.rpc_url);
    let rpc = Arc::new(JsonRpcContractClient::new(config.network.rpc_url.clone(), timeout)?);

    let store = LocalStore::open(&config.storage.data_dir)
        .with_context(|| format!("Failed to open data dir {}", config.storage.data_dir))?;
    let metrics = Arc::new(LifecycleMetrics::new()?);

    let lifecycle = Arc::new(TxLifecycle::new(
        rpc,
        wallet.clone(),
        config.tx_builder(),
        config.confirm_policy(),
        metrics.clone(),
    ));

    Ok(App {
        registry: config.vault_registry(),
        session: SessionManager::new(wallet, horizon.clone(), store.clone()),
        vaults: VaultClient::new(lifecycle.clone(), store.clone()),
        store,
        ledger: horizon,
        metrics,
        lifecycle,
        config,
    })
}

async fn run_command(app: &App, command: Command, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Connect => {
            let session = app.session.connect().await.map_err(|e| {
                if e.is_user_decline() {
                    anyhow::anyhow!("Wallet access was declined")
                } else {
                    e.into()
                }
            })?;
            if let Some(address) = session.address {
                println!("Connected: {}", address);
                println!(
                    "Balance:   {} XLM",
                    app.session.account().await.formatted_native_balance()
                );
            }
        }
        Command::Disconnect => {
            app.session.disconnect().await?;
            println!("Disconnected");
        }
        Command::Status => {
            let user = connected_user(app).await?;
            let account = app.session.account().await;
            println!("Address:  {}", user);
            println!("Balance:  {} XLM", account.formatted_native_balance());
            match &account.account_data {
                Some(data) => println!(
                    "Account:  seq {}, {} subentries",
                    data.sequence, data.subentry_count
                ),
                None => println!("Account:  not funded"),
            }
            let records = app.store.history()?;
            print_activity(&user, &account.payments, &records, 5);
        }
        Command::Vaults => {
            let user = app.session.restore().await?.address;
            print_vaults(app, user.as_ref()).await;
        }
        Command::Position { vault } => {
            let user = connected_user(app).await?;
            let vault = resolve_vault(&app.registry, vault.as_deref())?;
            print_position(app, &user, &vault).await?;
        }
        Command::Deposit { vault, amount } => {
            let user = connected_user(app).await?;
            let vault = resolve_vault(&app.registry, vault.as_deref())?;
            let result = app.vaults.deposit(&user, &vault, &amount, cancel).await;
            report_tx(app, "Deposit", result)?;
        }
        Command::Withdraw { vault, amount } => {
            let user = connected_user(app).await?;
            let vault = resolve_vault(&app.registry, vault.as_deref())?;
            let result = app.vaults.withdraw(&user, &vault, &amount, cancel).await;
            report_tx(app, "Withdraw", result)?;
        }
        Command::Init { vault } => {
            let user = connected_user(app).await?;
            let vault = resolve_vault(&app.registry, Some(&vault))?;
            let result = app.vaults.init_vault(&user, &vault, cancel).await;
            report_tx(app, "Init", result)?;
        }
        Command::Swap { from, to, amount } => {
            let user = connected_user(app).await?;
            let resolver =
                SwapPathResolver::new(app.config.swap.api_url.clone(), app.config.request_timeout())?;
            let swaps = SwapClient::new(
                resolver,
                app.lifecycle.clone(),
                app.config.router_address()?,
                app.config.swap_tokens()?,
                app.config.swap.slippage_bps,
            );
            let outcome = swaps.swap(&user, &from, &to, &amount, cancel).await?;
            println!(
                "Swap confirmed: {} (expected {} {}, min {})",
                short_hash(&outcome.hash),
                outcome.estimated_out,
                to,
                outcome.min_out
            );
            if let Some(received) = outcome.received {
                println!("Received: {} {}", received, to);
            }
            println!("{}", explorer_url(&app.config.network.name, &outcome.hash));
        }
        Command::History { limit } => {
            let user = connected_user(app).await?;
            let account = app.session.account().await;
            let records = app.store.history()?;
            print_activity(&user, &account.payments, &records, limit);
        }
        Command::Metrics => {
            let ledger = app.ledger.latest_ledger().await?;
            println!("Ledger:       {}", ledger.sequence);
            println!("Transactions: {}", ledger.successful_transaction_count);
            println!("Operations:   {}", ledger.operation_count);
            println!("Fee pool:     {} XLM", format_balance(&ledger.fee_pool));
            if let Some(closed_at) = ledger.closed_at {
                println!("Closed at:    {}", closed_at.to_rfc3339());
            }
            println!();
            println!("{}", app.metrics.gather_text()?);
        }
        Command::Price { .. } => {}
    }
    Ok(())
}

async fn show_price(config: &Config, asset: Option<&str>) -> Result<()> {
    let client = PriceClient::new(config.price.api_url.clone(), config.request_timeout())?;
    let asset = asset.unwrap_or(&config.price.asset_id);
    let quote = client.get_price(asset, &config.price.vs_currency).await?;
    println!(
        "{}: {:.4} {} ({:+.2}% 24h)",
        asset,
        quote.price,
        config.price.vs_currency.to_uppercase(),
        quote.change_24h
    );
    Ok(())
}

/// Restore the persisted session and require a connected address
async fn connected_user(app: &App) -> Result<Address> {
    app.session.restore().await?;
    match app.session.address().await {
        Ok(address) => Ok(address),
        Err(_) => bail!("No wallet connected. Run `pegaso connect` first."),
    }
}

/// Explicit id or symbol, else the configured selection
fn resolve_vault(registry: &VaultRegistry, wanted: Option<&str>) -> Result<VaultConfig> {
    let vault = match wanted {
        Some(key) => registry.get(key).or_else(|| registry.by_symbol(key)),
        None => registry.active(),
    };
    match vault {
        Some(vault) => Ok(vault.clone()),
        None => bail!("Unknown vault '{}'", wanted.unwrap_or_default()),
    }
}

fn report_tx(app: &App, label: &str, result: Result<TxOutcome, LifecycleError>) -> Result<()> {
    match result {
        Ok(outcome) => {
            println!(
                "{} confirmed: {} after {} polls",
                label,
                short_hash(&outcome.hash),
                outcome.attempts
            );
            println!("{}", explorer_url(&app.config.network.name, &outcome.hash));
            Ok(())
        }
        Err(e) if is_uninitialized_error(&e) => bail!("{}", UNINITIALIZED_HINT),
        Err(e) => Err(e.into()),
    }
}

async fn print_vaults(app: &App, user: Option<&Address>) {
    let deployed = app.registry.available();
    let totals = join_all(deployed.iter().map(|v| app.vaults.total_shares(v))).await;

    for (vault, total) in deployed.iter().zip(totals) {
        let shares = match user {
            Some(user) => display_or_zero(&app.vaults.balance(user, vault).await),
            None => "-".to_string(),
        };
        println!(
            "{:<5} {:<18} APY {:>10}  shares {:>14}  total {:>14}",
            vault.symbol,
            vault.name,
            vault.estimated_apy,
            shares,
            display_or_zero(&total)
        );
    }
    for vault in app.registry.all().iter().filter(|v| !v.is_deployed()) {
        println!("{:<5} {:<18} (not deployed)", vault.symbol, vault.name);
    }
}

async fn print_position(app: &App, user: &Address, vault: &VaultConfig) -> Result<()> {
    let position = match app.vaults.position(user, vault).await {
        Ok(position) => position,
        Err(e) if is_uninitialized_error(&e) => bail!("{}", UNINITIALIZED_HINT),
        Err(e) => return Err(e.into()),
    };
    let asset = app
        .vaults
        .asset_address(vault)
        .await
        .map(|a| token_symbol(a.as_str()).to_string());

    println!("Vault:         {} ({})", vault.name, vault.id);
    println!("Asset:         {}", display_or_zero(&asset));
    println!("Shares:        {}", format_balance(&position.shares.to_string()));
    println!("Total shares:  {}", format_balance(&position.total_shares.to_string()));
    println!(
        "Value:         {} {} (rate {})",
        format_balance(&position.asset_equivalent.to_string()),
        position.symbol,
        position.conversion_rate
    );
    println!("Pool APY:      {}", pool_apy());
    Ok(())
}

fn print_activity(
    user: &Address,
    payments: &[pegaso::rpc::PaymentRecord],
    records: &[pegaso::types::VaultTransactionRecord],
    limit: usize,
) {
    let entries = merge_activity(user, payments, records, limit);
    if entries.is_empty() {
        println!("No activity yet");
        return;
    }
    for entry in entries {
        let sign = match entry.kind {
            ActivityKind::ContractCall => "",
            kind if kind.is_inflow() => "+",
            _ => "-",
        };
        println!(
            "{}  {:<15} {}{} {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.kind.label(),
            sign,
            entry.amount,
            entry.asset,
            format_address(&entry.tx_hash)
        );
    }
}
