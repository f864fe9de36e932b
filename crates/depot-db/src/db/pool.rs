//! Connection pool setup

use std::time::Duration;

use depot_core::{ConfigurationError, DepotConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::error::DbError;

/// Connect to `DATABASE_URL` with the configured pool size.
pub async fn connect(config: &DepotConfig) -> Result<PgPool, DbError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| ConfigurationError::missing("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
