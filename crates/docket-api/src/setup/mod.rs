//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded [`Config`] to a running router, kept out
//! of `main.rs` so integration tests can build the same application.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use docket_core::Config;
use docket_infra::{init_telemetry, LogFormat};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    init_telemetry(LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;

    let storage = storage::setup_storage(&config).await?;

    let state = services::initialize_services(&config, pool, storage)?;

    services::start_workers(&state).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
