//! ihub-api - InsightHub analysis service
//!
//! Accepts inspection photographs, runs the configured detection passes and
//! serves severity-rated, tagged analysis results as JSON, annotated images
//! and PDF reports.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ihub_api::annotate::Annotator;
use ihub_api::detector::CompositeSource;
use ihub_api::storage::FileStorage;
use ihub_api::store::{AnalysisStore, RetentionPolicy};
use ihub_api::{build_router, spawn_retention_sweep, AppState};
use ihub_common::config::{resolve_root_folder, TomlConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ihub-api
#[derive(Parser, Debug)]
#[command(name = "ihub-api")]
#[command(about = "InsightHub image analysis service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "IHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long, env = "IHUB_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "IHUB_PORT")]
    port: Option<u16>,

    /// Folder for uploaded and annotated images
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level can apply
    let config_result = TomlConfig::load_or_default(args.config.as_deref());
    let default_level = config_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting InsightHub (ihub-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = config_result.context("Failed to load configuration")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let storage = FileStorage::new(&root_folder);
    storage
        .ensure_directories()
        .await
        .with_context(|| format!("Failed to initialize root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let detector = CompositeSource::from_config(&config.detectors)
        .context("Failed to initialize detectors")?;
    if detector.is_empty() {
        warn!("No detectors configured; every analysis will report zero detections");
    } else {
        for d in &config.detectors {
            info!(
                pass = %d.name,
                endpoint = %d.endpoint,
                optional = d.optional,
                "Detection pass configured"
            );
        }
    }

    let annotator =
        Annotator::from_config(&config.annotation).context("Failed to load annotation settings")?;

    let policy = RetentionPolicy::from(&config.retention);
    info!(
        max_entries = policy.max_entries,
        max_age_secs = ?config.retention.max_age_secs,
        "Analysis store retention"
    );
    let store = AnalysisStore::new(policy);

    let mut server = config.server.clone();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", server.host, server.port))?;

    let state = AppState::new(store, storage, detector.into_shared(), annotator, server);
    let sweep = spawn_retention_sweep(
        state.clone(),
        Duration::from_secs(config.retention.sweep_interval_secs),
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweep.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
