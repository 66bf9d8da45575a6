//! Sealer daemon binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sealer_core::config::AppConfig;
use sealer_server::{AppState, Completer, EmissionRegistry, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sealer - finalizes session recordings abandoned by their streaming node
#[derive(Parser, Debug)]
#[command(name = "sealerd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SEALER_CONFIG",
        default_value = "config/sealer.toml"
    )]
    config: String,
}

/// Load configuration from an optional TOML file overridden by `SEALER_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path,
            "No config file found, using defaults and environment variables"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SEALER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Sealer v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    if let Some(warning) = config.grace_warning() {
        tracing::warn!("{warning}");
    }

    // Register Prometheus metrics
    sealer_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Initialize upload store
    let storage = sealer_storage::from_config(&config.storage)
        .await
        .context("failed to initialize upload store")?;
    storage
        .health_check()
        .await
        .context("upload store health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Upload store initialized");

    // Initialize tracker source and audit log
    let trackers = sealer_registry::tracker_source_from_config(&config.trackers)
        .await
        .context("failed to initialize session tracker source")?;
    tracing::info!("Session tracker source initialized");

    let audit_log = sealer_registry::audit_log_from_config(&config.audit)
        .await
        .context("failed to initialize audit log")?;
    tracing::info!("Audit log initialized");

    // Emission tasks are shared with the health endpoint
    let emissions = Arc::new(EmissionRegistry::new());

    let completer = Completer::builder()
        .upload_store(storage.clone())
        .audit_log(audit_log)
        .tracker_source(trackers)
        .config(&config.completer)
        .emission_registry(emissions.clone())
        .build()
        .context("failed to start upload completer")?;

    // Create router
    let state = AppState::new(config.clone(), storage, emissions.clone());
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop reconciling, then give scheduled emissions a bounded time to finish.
    completer.stop().await;

    let timeout = config.completer.shutdown_timeout();
    match tokio::time::timeout(timeout, emissions.wait_idle()).await {
        Ok(stats) => {
            tracing::info!(
                emitted = stats.emitted,
                failed = stats.failed,
                "All emissions finished"
            );
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                pending = ?emissions.in_flight_uploads().await,
                "Emissions still running at shutdown timeout, aborting"
            );
            emissions.abort_emissions();
            let stats = emissions.wait_idle().await;
            tracing::warn!(cancelled = stats.cancelled, "Emissions aborted");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
