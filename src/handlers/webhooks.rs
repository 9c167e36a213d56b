//! Payment gateway callbacks
//!
//! These routes carry no JWT; each gateway is authenticated its own way
//! before the event is handed to reconciliation.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::AppState;
use crate::handlers::extract::{Json, Query};
use crate::models::ApiResponse;
use crate::services::webhook::{self, GatewayEvent, RelayRequest};
use crate::services::{mpesa, paypal, stripe};
use crate::utils::errors::{Result, RivayaError};

pub const RELAY_SECRET_HEADER: &str = "x-webhook-secret";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/webhooks/mpesa", post(mpesa_webhook))
        .route("/webhooks/paypal", post(paypal_webhook))
        .route("/webhooks/payments", post(relay_webhook))
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub outcome: &'static str,
}

async fn reconcile(state: &AppState, event: GatewayEvent) -> Result<ApiResponse<WebhookReceipt>> {
    let outcome = state.services.webhook_service.reconcile(event).await?;
    Ok(ApiResponse::ok(WebhookReceipt {
        received: true,
        outcome: outcome.as_str(),
    }))
}

async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookReceipt>> {
    let secret = state
        .settings
        .payments
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| RivayaError::FeatureDisabled("Stripe webhooks are not configured".to_string()))?;
    let signature = headers
        .get(stripe::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RivayaError::WebhookSignature("Missing Stripe-Signature header".to_string()))?;

    stripe::verify_signature(&body, signature, secret, chrono::Utc::now().timestamp())?;
    let event = stripe::parse_event(&body)?;
    reconcile(&state, event).await
}

#[derive(Debug, Deserialize)]
struct MpesaQuery {
    token: Option<String>,
}

async fn mpesa_webhook(
    State(state): State<AppState>,
    Query(query): Query<MpesaQuery>,
    Json(body): Json<Value>,
) -> Result<axum::Json<Value>> {
    mpesa::authenticate(
        query.token.as_deref(),
        state.settings.payments.mpesa_callback_token.as_deref(),
    )?;

    let event = mpesa::parse_callback(body)?;
    state.services.webhook_service.reconcile(event).await?;
    Ok(axum::Json(mpesa::acknowledgement()))
}

async fn paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookReceipt>> {
    let client = &state.services.paypal_client;
    if !client.is_enabled() {
        return Err(RivayaError::FeatureDisabled("PayPal webhooks are not configured".to_string()));
    }

    let transmission = paypal::TransmissionHeaders::from_headers(&headers)?;
    let raw = paypal::raw_event(&body)?;
    if !client.verify_webhook(&transmission, raw).await? {
        return Err(RivayaError::WebhookSignature("PayPal signature verification failed".to_string()));
    }

    let event = paypal::parse_event(raw)?;
    reconcile(&state, event).await
}

/// Relay for notifications forwarded by another service; off unless a secret is set
async fn relay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RelayRequest>,
) -> Result<ApiResponse<WebhookReceipt>> {
    let expected = state
        .settings
        .payments
        .relay_secret
        .as_deref()
        .ok_or_else(|| RivayaError::not_found("Route", "/webhooks/payments"))?;
    let provided = headers.get(RELAY_SECRET_HEADER).and_then(|v| v.to_str().ok());
    webhook::authenticate_relay(provided, expected)?;

    let event = webhook::parse_relay(request)?;
    reconcile(&state, event).await
}
