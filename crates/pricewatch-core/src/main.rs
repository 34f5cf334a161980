//! PriceWatch CLI
//!
//! Command-line interface for the PriceWatch alert engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pricewatch::alerting::{build_sink, notification_channel};
use pricewatch::api::HttpServer;
use pricewatch::config::LoggingConfig;
use pricewatch::{AlertEngine, Config};

/// PriceWatch - price threshold alerts
#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "PRICEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the alert scheduler and the HTTP API
    Serve {
        /// Bind host (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// HTTP API port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fetch the current quote for a symbol
    Price {
        /// Ticker symbol, e.g. AAPL or ^GSPC
        symbol: String,
    },

    /// Show which markets are in their regular session
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_tracing(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Price { symbol } => run_price(config, &symbol, cli.format).await,
        Commands::Status => run_status(config, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if let Some(addr) = config.metrics.listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus exporter listening");
    }

    if config.provider.api_key.is_none() {
        warn!("No provider API key configured; every quote will be unavailable");
    }

    let engine = Arc::new(AlertEngine::from_config(&config)?);

    if let Some(path) = &config.store.snapshot_path {
        if path.exists() {
            engine
                .store()
                .load_from(path)
                .await
                .with_context(|| format!("failed to restore snapshot {}", path.display()))?;
        }
    }

    let sink = build_sink(&config.notifier)?;
    let (queue, dispatcher) = notification_channel(config.scheduler.notification_queue, sink);
    let scheduler = engine.scheduler(queue, &config.scheduler);

    let shutdown = CancellationToken::new();
    let dispatcher_task = tokio::spawn(dispatcher.run());
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        signal.cancel();
    });

    let addr = config.server.bind_addr();
    let served = HttpServer::new(engine.clone()).serve(&addr, shutdown.clone()).await;

    // the server may have failed on its own; stop the rest either way
    shutdown.cancel();
    scheduler_task.await.context("scheduler task failed")?;
    let stats = dispatcher_task.await.context("dispatcher task failed")?;
    info!(delivered = stats.delivered, failed = stats.failed, "Notifications drained");

    if let Some(path) = &config.store.snapshot_path {
        engine
            .store()
            .save_to(path)
            .await
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    }

    served?;
    Ok(())
}

async fn run_price(config: Config, symbol: &str, format: OutputFormat) -> anyhow::Result<()> {
    let engine = AlertEngine::from_config(&config)?;
    let quote = engine.quote(symbol).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&quote)?),
        OutputFormat::Text => {
            let arrow = if quote.is_up() { "▲" } else { "▼" };
            println!(
                "{} {:.2} {} {:+.2} ({:+.2}%)",
                quote.symbol, quote.price, arrow, quote.change, quote.change_percent
            );
            println!("   Previous close: {:.2}", quote.previous_close);
            println!("   Volume:         {}", quote.volume);
        }
    }

    Ok(())
}

fn run_status(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let engine = AlertEngine::from_config(&config)?;
    let status = engine.market_status(Utc::now());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => {
            let label = |open: bool| if open { "open" } else { "closed" };
            println!("Market status at {}", status.as_of.format("%Y-%m-%d %H:%M UTC"));
            println!("   US (NYSE/Nasdaq): {}", label(status.us_market_open));
            println!("   IHSG (IDX):       {}", label(status.ihsg_market_open));
            println!("   Crypto:           {}", label(status.crypto_market_open));
        }
    }

    Ok(())
}
