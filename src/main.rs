use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use pgcopydb_api::api::{AppState, api_routes};
use pgcopydb_api::config::ServiceConfig;
use pgcopydb_api::jobs::{JobRegistry, JobRunner, LogStore};
use pgcopydb_api::pgcopydb::CommandBuilder;

/// Rolling diagnostics file kept next to the job logs.
const DIAGNOSTICS_FILE: &str = "pgcopydb-api.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();

    // The log directory is resolved first so diagnostics can be written there too.
    let log_store = LogStore::resolve(&config.log_dir, &config.fallback_log_dir)
        .await
        .context("Failed to prepare log directory")?;

    let (file_writer, _guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
        log_store.dir(),
        DIAGNOSTICS_FILE,
    ));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let addr = config.bind_addr()?;

    eprintln!("🐘 pgcopydb API v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", addr);
    eprintln!("   Log directory: {}", log_store.dir().display());
    eprintln!("   pgcopydb binary: {}", config.pgcopydb_bin);
    eprintln!("   Pod: {}\n", config.pod_name);

    let registry = JobRegistry::new();
    let runner = Arc::new(JobRunner::new(registry, log_store));
    let builder = CommandBuilder::new(config.pgcopydb_bin.clone());
    let app = api_routes(AppState::new(runner, builder, config.pod_name.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "pgcopydb API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Jobs still running keep their child processes; only the registry is lost.
    tracing::info!("pgcopydb API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
