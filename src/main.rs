//! RIVAYA API
//!
//! Main application entry point

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use rivaya_api::{
    app::{build_router, AppState},
    config::Settings,
    database::{create_pool, run_migrations},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    settings.validate()?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", rivaya_api::info());

    // Initialize database connection
    info!("Connecting to database...");
    let pool = create_pool(&settings.database).await?;

    // Run database migrations
    info!("Running database migrations...");
    run_migrations(&pool).await?;

    let bind_address = settings.bind_address();
    let sweep_interval = Duration::from_secs(settings.contributions.overdue_sweep_interval_secs);

    let state = AppState::new(settings, pool)?;
    match state.services.redis_service.health_check().await {
        Ok(true) => info!("Redis connection verified"),
        _ => warn!("Redis is not reachable; token refresh will fail until it is"),
    }

    let sweeper = spawn_sweeper(state.clone(), sweep_interval);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(address = %bind_address, "RIVAYA API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("RIVAYA API stopped");
    Ok(())
}

/// Periodic housekeeping: flag overdue contributions and prune limiter state
fn spawn_sweeper(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            match state.db.mark_overdue_contributions(Utc::now().date_naive()).await {
                Ok(0) => {}
                Ok(count) => info!(count, "Marked contributions overdue"),
                Err(e) => error!(error = %e, "Overdue sweep failed"),
            }
            state.rate_limiter.retain_recent();
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
