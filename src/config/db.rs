// src/config/db.rs
// DOCUMENTATION: Database connection pool initialization
// PURPOSE: Pool settings for the PostGIS geo cache store

use crate::config::Config;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Pooled connections idle longer than this are closed
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Connections are recycled after this age
pub const POOL_MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Pool options for the geo cache
/// DOCUMENTATION: Keeps DB_MIN_CONNECTIONS warm between refresh bursts. Every
/// connection runs with DB_STATEMENT_TIMEOUT_MS as its statement timeout, which
/// bounds radius scans and upsert transactions.
pub fn pool_options(config: &Config) -> PgPoolOptions {
    let statement_timeout_ms = config.db_statement_timeout_ms;

    PgPoolOptions::new()
        .min_connections(config.db_min_connections)
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connection_timeout))
        .idle_timeout(POOL_IDLE_TIMEOUT)
        .max_lifetime(POOL_MAX_LIFETIME)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = {}", statement_timeout_ms))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
}

/// Initialize PostgreSQL connection pool
/// DOCUMENTATION: Only called when STORE_BACKEND=postgres
pub async fn init_db_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    log::info!(
        "Initializing geo cache pool ({}..{} connections, statement timeout {}ms)",
        config.db_min_connections,
        config.db_max_connections,
        config.db_statement_timeout_ms
    );

    let pool = pool_options(config).connect(&config.database_url).await?;

    let version: String = sqlx::query_scalar("SELECT version()")
        .fetch_one(&pool)
        .await?;
    log::info!("Connected to {}", version);

    Ok(pool)
}
