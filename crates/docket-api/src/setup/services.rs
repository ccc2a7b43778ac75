//! Service initialization and application state setup

use crate::state::AppState;
use anyhow::{Context, Result};
use docket_core::Config;
use docket_db::create_document_repository;
use docket_storage::Storage;
use docket_worker::{create_event_bus, finalizer_worker};
use sqlx::PgPool;
use std::sync::Arc;

/// Build the repository and event bus, returning the application state
pub fn initialize_services(
    config: &Config,
    pool: Option<PgPool>,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let repository = create_document_repository(config.repository(), pool.clone())
        .context("Failed to initialize document repository")?;

    let event_bus =
        create_event_bus(config.event_bus(), pool).context("Failed to initialize event bus")?;

    Ok(Arc::new(AppState::new(
        config.clone(),
        repository,
        storage,
        event_bus,
    )))
}

/// Start the in-process stage workers. Classification, OCR and extraction run as
/// separate services; only the finalizer ships with the API.
pub async fn start_workers(state: &Arc<AppState>) -> Result<()> {
    let worker_config = state.config.worker().clone();
    if !worker_config.finalizer_enabled {
        tracing::info!("Finalizer worker disabled");
        return Ok(());
    }

    let subscriber = state
        .event_bus
        .subscribe()
        .await
        .context("Failed to subscribe finalizer to document changes")?;

    let worker = finalizer_worker(
        state.repository.clone(),
        state.event_bus.publisher.clone(),
        state.config.processing_flags(),
        worker_config,
    );
    state.register_worker(worker.spawn(subscriber)).await;

    tracing::info!("Finalizer worker started");
    Ok(())
}
