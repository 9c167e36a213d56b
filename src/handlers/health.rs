//! Liveness and readiness probes

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::database;
use crate::utils::errors::{Result, RivayaError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/db", get(database_health))
        .route("/health/ready", get(readiness))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn database_health(State(state): State<AppState>) -> Result<Json<Value>> {
    let probe = database::probe(state.db.pool())
        .await
        .map_err(|e| unavailable("Database", e))?;

    Ok(Json(json!({
        "status": "ok",
        "database": {
            "connected": true,
            "userCount": probe.user_count,
            "pingMs": probe.ping_ms,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

fn unavailable(component: &str, error: RivayaError) -> RivayaError {
    warn!(error = %error, component, "Health check failed");
    RivayaError::ServiceUnavailable(format!("{} is unavailable", component))
}

async fn readiness(State(state): State<AppState>) -> Response {
    let database_healthy = database::health_check(state.db.pool()).await.is_ok();
    let services = state.services.health_check().await;

    let mut issues = services.get_issues();
    if !database_healthy {
        issues.insert(0, "Database connection failed".to_string());
    }

    let status = if issues.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if issues.is_empty() { "ready" } else { "not_ready" },
            "database": database_healthy,
            "services": services,
            "issues": issues,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_database_is_service_unavailable() {
        let error = unavailable(
            "Database",
            RivayaError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused")),
        );
        assert!(error.is_recoverable());

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(body["error"]["message"], "Service unavailable: Database is unavailable");
    }
}
