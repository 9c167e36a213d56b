//! Error handling for RIVAYA
//!
//! This module defines the main error type used throughout the application
//! and how each error is rendered to API clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

/// Main error type for the RIVAYA API
#[derive(Error, Debug)]
pub enum RivayaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid webhook signature: {0}")]
    WebhookSignature(String),

    #[error("Payment gateway error: {gateway}: {message}")]
    Gateway { gateway: String, message: String },

    #[error("Feature disabled: {0}")]
    FeatureDisabled(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for RIVAYA operations
pub type Result<T> = std::result::Result<T, RivayaError>;

impl RivayaError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RivayaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn gateway(gateway: impl Into<String>, message: impl Into<String>) -> Self {
        RivayaError::Gateway {
            gateway: gateway.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RivayaError::Redis(_)
                | RivayaError::Http(_)
                | RivayaError::Io(_)
                | RivayaError::Gateway { .. }
                | RivayaError::RateLimitExceeded
                | RivayaError::ServiceUnavailable(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RivayaError::Database(_) => ErrorSeverity::Critical,
            RivayaError::Migration(_) => ErrorSeverity::Critical,
            RivayaError::Config(_) => ErrorSeverity::Critical,
            RivayaError::PermissionDenied(_) => ErrorSeverity::Warning,
            RivayaError::Authentication(_) => ErrorSeverity::Warning,
            RivayaError::WebhookSignature(_) => ErrorSeverity::Warning,
            RivayaError::RateLimitExceeded => ErrorSeverity::Warning,
            RivayaError::Validation(_)
            | RivayaError::NotFound { .. }
            | RivayaError::Conflict(_)
            | RivayaError::InvalidStateTransition { .. }
            | RivayaError::FeatureDisabled(_)
            | RivayaError::PayloadTooLarge(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// HTTP status returned for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RivayaError::NotFound { .. } => StatusCode::NOT_FOUND,
            RivayaError::Validation(_) => StatusCode::BAD_REQUEST,
            RivayaError::WebhookSignature(_) => StatusCode::BAD_REQUEST,
            RivayaError::Authentication(_) | RivayaError::Jwt(_) => StatusCode::UNAUTHORIZED,
            RivayaError::PermissionDenied(_) | RivayaError::FeatureDisabled(_) => {
                StatusCode::FORBIDDEN
            }
            RivayaError::Conflict(_) | RivayaError::InvalidStateTransition { .. } => {
                StatusCode::CONFLICT
            }
            RivayaError::Database(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            RivayaError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RivayaError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            RivayaError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            RivayaError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            RivayaError::NotFound { .. } => "NOT_FOUND",
            RivayaError::Validation(_) => "VALIDATION_ERROR",
            RivayaError::Authentication(_) | RivayaError::Jwt(_) => "UNAUTHORIZED",
            RivayaError::PermissionDenied(_) => "FORBIDDEN",
            RivayaError::FeatureDisabled(_) => "FEATURE_DISABLED",
            RivayaError::Conflict(_) => "CONFLICT",
            RivayaError::Database(e) if is_unique_violation(e) => "CONFLICT",
            RivayaError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            RivayaError::WebhookSignature(_) => "INVALID_SIGNATURE",
            RivayaError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            RivayaError::RateLimitExceeded => "RATE_LIMITED",
            RivayaError::Gateway { .. } => "GATEWAY_ERROR",
            RivayaError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to API clients
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::CONFLICT if matches!(self, RivayaError::Database(_)) => {
                "Resource already exists".to_string()
            }
            StatusCode::UNAUTHORIZED if matches!(self, RivayaError::Jwt(_)) => {
                "Invalid or expired token".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Whether a sqlx error is a Postgres unique constraint violation
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl IntoResponse for RivayaError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                error!(
                    error = %self,
                    status = status.as_u16(),
                    recoverable = self.is_recoverable(),
                    "Request failed"
                );
            }
            ErrorSeverity::Warning => {
                warn!(error = %self, status = status.as_u16(), "Request rejected");
            }
            ErrorSeverity::Info => {}
        }

        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RivayaError::not_found("Group", "x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(RivayaError::Validation("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RivayaError::Authentication("no".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(RivayaError::PermissionDenied("no".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(RivayaError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(RivayaError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            RivayaError::gateway("stripe", "down").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RivayaError::Config("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = RivayaError::Config("secret connection string".into());
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.public_message(), "Internal server error");

        let err = RivayaError::Validation("Amount must be positive".into());
        assert!(err.public_message().contains("Amount must be positive"));
    }

    #[test]
    fn test_row_not_found_is_internal() {
        let err = RivayaError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_severity_and_recoverability() {
        assert_eq!(RivayaError::Config("x".into()).severity(), ErrorSeverity::Critical);
        assert_eq!(RivayaError::RateLimitExceeded.severity(), ErrorSeverity::Warning);
        assert!(RivayaError::RateLimitExceeded.is_recoverable());
        assert!(!RivayaError::Validation("x".into()).is_recoverable());
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }
}
