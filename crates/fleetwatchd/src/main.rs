//! fleetwatchd: the Fleetwatch daemon.
//!
//! Single binary that assembles the aggregation tier:
//! - Registry (in-memory fleet view + subscriber set)
//! - Collection loop (discovery, instance and scheduler polling, broadcast)
//! - REST API, snapshot stream and Prometheus exposition
//!
//! # Usage
//!
//! ```text
//! fleetwatchd serve --port 8000 --scheduler-url http://scheduler:8080
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use fleetwatch_api::{ApiState, InferenceForwarder, build_router};
use fleetwatch_collector::{CollectionLoop, CollectorConfig, HttpFetcher};
use fleetwatch_state::Registry;

const DEFAULT_LOG_FILTER: &str = "info,fleetwatchd=debug,fleetwatch=debug";

#[derive(Parser)]
#[command(name = "fleetwatchd", about = "Fleetwatch telemetry aggregation daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the fleet and serve the aggregated view.
    Serve {
        /// Port to listen on.
        #[arg(long, env = "PORT", default_value = "8000")]
        port: u16,

        /// Base URL of the scheduler.
        #[arg(
            long,
            env = "LLM_D_SCHEDULER_URL",
            default_value = fleetwatch_collector::config::DEFAULT_SCHEDULER_URL
        )]
        scheduler_url: String,

        /// Seconds between collection cycles.
        #[arg(long, env = "METRICS_COLLECTION_INTERVAL", default_value = "5")]
        interval: u64,

        /// Timeout for each instance and scheduler fetch, in milliseconds.
        #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "5000")]
        fetch_timeout_ms: u64,

        /// Timeout for relayed inference requests, in milliseconds.
        #[arg(long, env = "FORWARD_TIMEOUT_MS", default_value = "30000")]
        forward_timeout_ms: u64,

        /// Only consider metric samples for this model name.
        #[arg(long, env = "MODEL_FILTER")]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            port,
            scheduler_url,
            interval,
            fetch_timeout_ms,
            forward_timeout_ms,
            model,
        } => {
            let config = CollectorConfig::new(scheduler_url)
                .with_interval(Duration::from_secs(interval))
                .with_fetch_timeout(Duration::from_millis(fetch_timeout_ms))
                .with_model(model);
            config.validate().context("invalid collector configuration")?;
            anyhow::ensure!(forward_timeout_ms > 0, "forward timeout must be greater than zero");

            run_serve(port, config, Duration::from_millis(forward_timeout_ms)).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(
    port: u16,
    config: CollectorConfig,
    forward_timeout: Duration,
) -> anyhow::Result<()> {
    info!(
        scheduler = %config.scheduler_url,
        interval_secs = config.interval.as_secs(),
        model = config.model.as_deref().unwrap_or("*"),
        "Fleetwatch daemon starting"
    );

    // ── Initialize subsystems ──────────────────────────────────

    let registry = Registry::new();
    let collector = CollectionLoop::new(&config, registry.clone());
    let forwarder = InferenceForwarder::new(
        HttpFetcher::new(),
        &config.scheduler_url,
        forward_timeout,
        registry.clone(),
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let collector_handle = tokio::spawn(async move {
        collector.run(shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState::new(registry, forwarder));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "API server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the collection loop to close subscriber queues.
    let _ = collector_handle.await;

    info!("Fleetwatch daemon stopped");
    Ok(())
}
