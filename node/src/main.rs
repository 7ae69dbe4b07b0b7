// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trustline Ledger Node
//!
//! Entry point for the `trustline-node` binary. Parses CLI arguments,
//! resolves configuration, initializes logging and metrics, opens the line
//! store, and serves the HTTP/WS API.
//!
//! - `run`     start the node
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use trustline_protocol::clock::SystemClock;
use trustline_protocol::config::{EVENT_CHANNEL_CAPACITY, PROTOCOL_VERSION};
use trustline_protocol::ledger::{BroadcastSink, CreditLineRegistry};
use trustline_protocol::storage::{LedgerDb, LineStore, MemoryStore};

use cli::{Commands, TrustlineNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use settings::NodeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TrustlineNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let config = NodeConfig::resolve(&args)?;
    tracing::info!(
        listen_port = config.listen_port,
        metrics_port = config.metrics_port,
        data_dir = %config.data_dir.display(),
        in_memory = config.in_memory,
        "starting trustline-node"
    );

    // --- Line store ---
    let store: Arc<dyn LineStore> = if config.in_memory {
        tracing::warn!("running with an in-memory store; nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        let db_path = config.db_path();
        std::fs::create_dir_all(&db_path).with_context(|| {
            format!("failed to create database directory: {}", db_path.display())
        })?;
        let db = LedgerDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        tracing::info!(path = %db_path.display(), "database opened");
        Arc::new(db)
    };

    // --- Registry ---
    let events = BroadcastSink::new(EVENT_CHANNEL_CAPACITY);
    let registry = Arc::new(
        CreditLineRegistry::new(
            config.ledger.clone(),
            store,
            Arc::new(SystemClock),
            Arc::new(events.clone()),
        )
        .context("invalid ledger configuration")?,
    );

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    let active = registry
        .active_line_count()
        .context("failed to count open lines")?;
    node_metrics.active_lines.set(active as i64);
    tracing::info!(
        lines = registry.line_count().context("failed to count lines")?,
        active,
        "ledger loaded"
    );

    // --- Application state ---
    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        registry: Arc::clone(&registry),
        events,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", config.listen_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    registry.flush().context("failed to flush ledger on shutdown")?;
    tracing::info!("trustline-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("trustline-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the corresponding branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
