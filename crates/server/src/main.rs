//! Concierge server
//!
//! Configuration file from the first argument or `CONCIERGE_CONFIG`;
//! every setting can be overridden with `CONCIERGE__SECTION__KEY`.

mod routes;
mod state;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use concierge_config::ConfigStore;
use tokio::net::TcpListener;

use crate::state::AppState;

const CONFIG_PATH_ENV: &str = "CONCIERGE_CONFIG";

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let metrics = telemetry::init_metrics()?;

    let path = config_path();
    let config =
        Arc::new(ConfigStore::load(path.as_deref()).context("failed to load configuration")?);
    let settings = config.service();

    let sender = state::message_sender(&settings)?;
    let state = AppState::build(config.clone(), sender).await?.with_metrics(metrics);

    // Semantic tier answers not-ready until the index is built
    let indexing = state.clone();
    tokio::spawn(async move {
        indexing.initialize_examples().await;
    });

    let app = routes::router(state.clone());

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "Concierge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.escalations.reset();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
