//! Database connection management

use std::time::{Duration, Instant};

use sqlx::{Pool, Postgres};

use crate::config::DatabaseConfig;
use crate::utils::errors::RivayaError;

pub type DatabasePool = Pool<Postgres>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

fn pool_options(config: &DatabaseConfig) -> sqlx::postgres::PgPoolOptions {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
        .max_lifetime(Some(MAX_LIFETIME))
}

/// Create a new database connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, RivayaError> {
    let pool = pool_options(config).connect(&config.url).await?;

    // Test the connection
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        "Database connection pool created successfully"
    );
    Ok(pool)
}

/// Pool that connects on first use
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<DatabasePool, RivayaError> {
    Ok(pool_options(config).connect_lazy(&config.url)?)
}

/// Run database migrations
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), RivayaError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// Check database health
pub async fn health_check(pool: &DatabasePool) -> Result<(), RivayaError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await?;

    Ok(())
}

/// Result of a timed database probe
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub user_count: i64,
    pub ping_ms: u64,
}

/// Ping the database and count users
pub async fn probe(pool: &DatabasePool) -> Result<DatabaseHealth, RivayaError> {
    let started = Instant::now();
    health_check(pool).await?;
    let ping_ms = started.elapsed().as_millis() as u64;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    Ok(DatabaseHealth {
        user_count: count.0,
        ping_ms,
    })
}
