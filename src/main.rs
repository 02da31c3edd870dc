//! P&L Guard - Main Entry Point
//!
//! Polls Paradex positions and alerts on Telegram when total unrealized
//! P&L leaves the configured band.

use anyhow::{Context, Result};
use clap::Parser;
use pnl_guard::config::{Config, ConfigOverrides};
use pnl_guard::exchange::ParadexClient;
use pnl_guard::monitor::MonitorLoop;
use pnl_guard::notify::TelegramNotifier;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Paradex total unrealized P&L monitor
#[derive(Parser)]
#[command(name = "pnl-guard")]
#[command(version, about = "Paradex total unrealized P&L monitor")]
struct Cli {
    /// Paradex JWT token (overrides PARADEX_JWT)
    #[arg(long)]
    jwt: Option<String>,

    /// Check interval in seconds [default: 60]
    #[arg(long)]
    interval: Option<u64>,

    /// Upper P&L threshold [default: +20]
    #[arg(long, allow_negative_numbers = true)]
    upper: Option<Decimal>,

    /// Lower P&L threshold [default: -20]
    #[arg(long, allow_negative_numbers = true)]
    lower: Option<Decimal>,

    /// Trade reminder interval in seconds, 0 to disable [default: 3600]
    #[arg(long, allow_negative_numbers = true)]
    trade_reminder_interval: Option<i64>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            jwt: cli.jwt,
            poll_interval_secs: cli.interval,
            upper_threshold: cli.upper,
            lower_threshold: cli.lower,
            reminder_interval_secs: cli.trade_reminder_interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logging()?;

    info!("Starting Paradex P&L Monitor v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let overrides = ConfigOverrides::from(cli);
    let config = Config::load(&overrides)?;
    config.validate()?;
    log_config(&config);

    let client = ParadexClient::new(&config.paradex)?;
    let notifier = TelegramNotifier::new(&config.telegram)?;
    let monitor = MonitorLoop::new(config.monitor.clone(), client, notifier);

    match monitor.next_reminder_at() {
        Some(at) => info!(
            "Trade reminder enabled. Interval: {}s. Next reminder at: {}",
            config.monitor.reminder_interval_secs, at
        ),
        None => info!("Trade reminder disabled (interval=0)."),
    }

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            // Keep the sender alive so the monitor keeps running
            std::future::pending::<()>().await;
        }
        info!("🛑 Gracefully shutting down...");
        shutdown_tx.send(true).ok();
    });

    monitor.run(shutdown_rx).await;

    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs").context("Failed to create logs directory")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "pnl-guard.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pnl_guard=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}

/// Log the effective configuration. Credentials are never printed.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!(
        "   Interval: {}s | Upper: {} | Lower: {} | Trade reminder: {}s",
        config.monitor.poll_interval_secs,
        config.monitor.upper_threshold,
        config.monitor.lower_threshold,
        config.monitor.reminder_interval_secs
    );
    info!(
        "   Paradex: {} (timeout {}s, {} retries) | Telegram chat: {}",
        config.paradex.api_url,
        config.paradex.request_timeout_secs,
        config.paradex.max_retries,
        config.telegram.chat_id
    );
}
