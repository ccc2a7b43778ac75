//! Database setup and initialization

use anyhow::{Context, Result};
use docket_core::{Config, EventBusBackend, RepositoryBackend};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

/// Connect and migrate when the repository or the event bus lives in PostgreSQL.
/// Fully in-memory deployments get `None`.
pub async fn setup_database(config: &Config) -> Result<Option<PgPool>> {
    let needs_postgres = config.repository().backend == RepositoryBackend::Postgres
        || config.event_bus().backend == EventBusBackend::Postgres;
    if !needs_postgres {
        tracing::info!("No PostgreSQL-backed component configured, skipping database setup");
        return Ok(None);
    }

    let database_url = config
        .database_url()
        .context("DATABASE_URL must be set for PostgreSQL-backed components")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    // Run pending migrations on startup (path: workspace migrations/ from crate root)
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
