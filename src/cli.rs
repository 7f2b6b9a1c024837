//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::rate_api_adapter::RateApiAdapter;
use crate::domain::currency::{Currency, RateQuote};
use crate::domain::error::LedgerError;
use crate::domain::ledger::{self, BuyOrder, local_now};
use crate::domain::trade::{Trade, TradeId};
use crate::ports::config_port::ConfigPort;
use crate::ports::export_port::ExportPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::rate_port::RatePort;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3001";

#[derive(Parser, Debug)]
#[command(name = "fxledger", about = "Personal foreign-exchange trade ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Rates given on the command line are display quotes (JPY per 100 yen).
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Record a purchase
    Buy {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        rate: Decimal,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Close an open trade
    Sell {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        id: TradeId,
        #[arg(long)]
        rate: Decimal,
    },
    /// Delete a trade
    Delete {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        id: TradeId,
    },
    /// List trades, newest first
    List {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Export trades as CSV
    Export {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        currency: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show live exchange rates
    Rates {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let result = match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::Buy {
            config,
            currency,
            amount,
            rate,
            memo,
        } => run_buy(&config, &currency, amount, rate, memo),
        Command::Sell { config, id, rate } => run_sell(&config, id, rate),
        Command::Delete { config, id } => run_delete(&config, id),
        Command::List { config, currency } => run_list(&config, currency.as_deref()),
        Command::Export {
            config,
            currency,
            output,
        } => run_export(&config, currency.as_deref(), output.as_deref()),
        Command::Rates { config } => run_rates(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second init (tests driving `run` repeatedly) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, LedgerError> {
    tracing::debug!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Opens the store selected by `[database] backend` (default `sqlite`).
pub fn open_ledger(
    config: &dyn ConfigPort,
) -> Result<Arc<dyn LedgerPort + Send + Sync>, LedgerError> {
    let backend = config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string());

    match backend.trim().to_ascii_lowercase().as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Arc::new(SqliteAdapter::from_config(config)?))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            use crate::adapters::postgres_adapter::PostgresAdapter;
            Ok(Arc::new(PostgresAdapter::from_config(config)?))
        }
        other => Err(LedgerError::ConfigInvalid {
            section: "database".into(),
            key: "backend".into(),
            reason: format!("backend '{other}' is not available in this build"),
        }),
    }
}

fn run_buy(
    config_path: &Path,
    currency: &str,
    amount: Decimal,
    rate: Decimal,
    memo: Option<String>,
) -> Result<(), LedgerError> {
    let config = load_config(config_path)?;
    let store = open_ledger(&config)?;

    let order = BuyOrder::new(
        Some(currency),
        Some(amount),
        Some(RateQuote::Display(rate)),
        memo,
    )?;
    let trade = ledger::open_trade(&*store, order, local_now())?;

    println!(
        "Recorded trade {}: bought {} {} at {} (cost {})",
        trade.id,
        trade.buy_amount,
        trade.currency,
        trade.display_buy_rate(),
        trade.buy_local
    );
    Ok(())
}

fn run_sell(config_path: &Path, id: TradeId, rate: Decimal) -> Result<(), LedgerError> {
    let config = load_config(config_path)?;
    let store = open_ledger(&config)?;

    let settlement = ledger::close_trade(
        &*store,
        id,
        Some(RateQuote::Display(rate)),
        local_now().date(),
    )?;

    println!(
        "Closed trade {id}: proceeds {}, profit {}",
        settlement.sell_local, settlement.profit
    );
    Ok(())
}

fn run_delete(config_path: &Path, id: TradeId) -> Result<(), LedgerError> {
    let config = load_config(config_path)?;
    let store = open_ledger(&config)?;

    ledger::delete_trade(&*store, id)?;
    println!("Deleted trade {id}");
    Ok(())
}

fn run_list(config_path: &Path, currency: Option<&str>) -> Result<(), LedgerError> {
    let config = load_config(config_path)?;
    let store = open_ledger(&config)?;

    let trades = ledger::list_trades(&*store, currency)?;
    if trades.is_empty() {
        eprintln!("No trades found");
        return Ok(());
    }

    println!(
        "{:>5}  {:<3}  {:<6}  {:<10}  {:>14}  {:>12}  {:<10}  {:>12}  {:>14}  MEMO",
        "ID", "CCY", "STATUS", "BUY DATE", "AMOUNT", "BUY RATE", "SELL DATE", "SELL RATE", "PROFIT"
    );
    for trade in &trades {
        println!("{}", format_row(trade));
    }
    Ok(())
}

fn format_row(trade: &Trade) -> String {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let settlement = trade.settlement();

    format!(
        "{:>5}  {:<3}  {:<6}  {:<10}  {:>14}  {:>12}  {:<10}  {:>12}  {:>14}  {}",
        trade.id,
        trade.currency.code(),
        if trade.is_open() { "open" } else { "closed" },
        trade.buy_date.to_string(),
        trade.buy_amount.to_string(),
        trade.display_buy_rate().to_string(),
        optional(settlement.map(|s| s.sell_date.to_string())),
        optional(trade.display_sell_rate().map(|r| r.to_string())),
        optional(settlement.map(|s| s.profit.to_string())),
        trade.memo.as_deref().unwrap_or("")
    )
}

fn run_export(
    config_path: &Path,
    currency: Option<&str>,
    output: Option<&Path>,
) -> Result<(), LedgerError> {
    let config = load_config(config_path)?;
    let store = open_ledger(&config)?;

    let trades = ledger::list_trades(&*store, currency)?;
    let exporter = CsvAdapter::new();
    let bytes = exporter.render(&trades)?;

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => {
            let scope = Currency::parse_filter(currency).and_then(Result::ok);
            PathBuf::from(exporter.file_name(scope, local_now()))
        }
    };
    fs::write(&path, bytes)?;

    eprintln!("Exported {} trades to {}", trades.len(), path.display());
    Ok(())
}

fn run_rates(config_path: &Path) -> Result<(), LedgerError> {
    let config = load_config(config_path)?;
    let rates = RateApiAdapter::from_config(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let snapshot = runtime.block_on(rates.fetch_rates())?;

    println!("Rates as of {}", snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for (currency, display) in snapshot.display_rates() {
        let unit = currency.quote_unit();
        println!("{unit:>4} {currency} ({})  {display}", currency.symbol());
    }
    Ok(())
}

#[cfg(feature = "web")]
fn run_serve(config_path: &Path) -> Result<(), LedgerError> {
    use crate::adapters::web::{AppState, WebOptions, build_router};
    use std::net::SocketAddr;

    let config = load_config(config_path)?;
    let store = open_ledger(&config)?;
    let rates = Arc::new(RateApiAdapter::from_config(&config)?);

    let listen = config
        .get_string("web", "listen")
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
    let addr: SocketAddr = listen.parse().map_err(|e| LedgerError::ConfigInvalid {
        section: "web".into(),
        key: "listen".into(),
        reason: format!("{listen}: {e}"),
    })?;

    let static_dir = config.get_string("web", "static_dir").map(PathBuf::from);
    if let Some(dir) = static_dir.as_ref().filter(|d| !d.is_dir()) {
        tracing::warn!(dir = %dir.display(), "static directory does not exist");
    }

    let state = AppState {
        ledger: store,
        rates,
        exporter: Arc::new(CsvAdapter::new()),
    };
    let options = WebOptions {
        static_dir,
        cors: config.get_bool("web", "cors", true),
    };
    let router = build_router(state, options);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "web server listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("web server stopped");
        Ok::<(), LedgerError>(())
    })
}

#[cfg(feature = "web")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

#[cfg(not(feature = "web"))]
fn run_serve(_config_path: &Path) -> Result<(), LedgerError> {
    Err(LedgerError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "web feature is required for serve",
    )))
}
