//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the RIVAYA API.

use std::path::Path;

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::utils::errors::{Result, RivayaError};

/// Initialize logging based on configuration
///
/// The returned guard flushes the file writer and must be held until exit.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match &config.file_path {
        Some(path) => {
            let path = Path::new(path);
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("rivaya-api.log");

            let file_appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| RivayaError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log user actions with structured data
pub fn log_user_action(user_id: Uuid, action: &str, details: Option<&str>) {
    info!(
        user_id = %user_id,
        action = action,
        details = details,
        "User action performed"
    );
}

/// Log group events
pub fn log_group_event(group_id: Uuid, event: &str, user_id: Option<Uuid>, details: Option<&str>) {
    info!(
        group_id = %group_id,
        event = event,
        user_id = user_id.map(|id| id.to_string()),
        details = details,
        "Group event occurred"
    );
}

/// Log payment lifecycle changes
pub fn log_payment_event(payment_id: Uuid, gateway: &str, from: &str, to: &str) {
    info!(
        payment_id = %payment_id,
        gateway = gateway,
        from = from,
        to = to,
        "Payment status changed"
    );
}

/// Log webhook handling outcome
pub fn log_webhook(gateway: &str, event_type: &str, event_id: &str, outcome: &str) {
    if outcome == "processed" || outcome == "duplicate" || outcome == "ignored" {
        debug!(
            gateway = gateway,
            event_type = event_type,
            event_id = event_id,
            outcome = outcome,
            "Webhook handled"
        );
    } else {
        warn!(
            gateway = gateway,
            event_type = event_type,
            event_id = event_id,
            outcome = outcome,
            "Webhook not applied"
        );
    }
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
