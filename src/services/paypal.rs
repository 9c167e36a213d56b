//! PayPal webhook verification and event mapping

use std::time::Duration;

use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PaymentsConfig;
use crate::models::payment::{PaymentGateway, PaymentStatus};
use crate::services::webhook::{EventAction, GatewayEvent};
use crate::utils::errors::{Result, RivayaError};
use crate::utils::logging::log_api_error;

/// Transmission headers PayPal sends with every webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionHeaders {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
}

impl TransmissionHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| RivayaError::WebhookSignature(format!("Missing {} header", name)))
        };

        Ok(Self {
            auth_algo: get("paypal-auth-algo")?,
            cert_url: get("paypal-cert-url")?,
            transmission_id: get("paypal-transmission-id")?,
            transmission_sig: get("paypal-transmission-sig")?,
            transmission_time: get("paypal-transmission-time")?,
        })
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    auth_algo: &'a str,
    cert_url: &'a str,
    transmission_id: &'a str,
    transmission_sig: &'a str,
    transmission_time: &'a str,
    webhook_id: &'a str,
    webhook_event: &'a RawValue,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verification_status: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// PayPal REST client used for webhook verification
#[derive(Clone, Debug)]
pub struct PaypalClient {
    client: Client,
    api_base: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    webhook_id: Option<String>,
}

impl PaypalClient {
    pub fn new(config: &PaymentsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("RIVAYA-API/1.0")
            .build()?;

        Ok(Self {
            client,
            api_base: config.paypal_api_base.trim_end_matches('/').to_string(),
            client_id: config.paypal_client_id.clone(),
            client_secret: config.paypal_client_secret.clone(),
            webhook_id: config.paypal_webhook_id.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.webhook_id.is_some()
    }

    /// Client-credentials OAuth token
    async fn access_token(&self) -> Result<String> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(RivayaError::FeatureDisabled("PayPal is not configured".to_string()));
        };

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let message = format!("OAuth token request failed with HTTP {}", response.status());
            log_api_error("paypal", &message, None);
            return Err(RivayaError::gateway("paypal", message));
        }

        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    /// Ask PayPal whether a webhook delivery is authentic
    ///
    /// `event` must be the body exactly as delivered; PayPal checks the
    /// signature against those bytes.
    pub async fn verify_webhook(&self, headers: &TransmissionHeaders, event: &RawValue) -> Result<bool> {
        let webhook_id = self
            .webhook_id
            .as_deref()
            .ok_or_else(|| RivayaError::FeatureDisabled("PayPal is not configured".to_string()))?;
        let token = self.access_token().await?;

        let request = VerifyRequest {
            auth_algo: &headers.auth_algo,
            cert_url: &headers.cert_url,
            transmission_id: &headers.transmission_id,
            transmission_sig: &headers.transmission_sig,
            transmission_time: &headers.transmission_time,
            webhook_id,
            webhook_event: event,
        };

        let response = self
            .client
            .post(format!("{}/v1/notifications/verify-webhook-signature", self.api_base))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = format!("Signature verification failed with HTTP {}", response.status());
            log_api_error("paypal", &message, Some(&headers.transmission_id));
            return Err(RivayaError::gateway("paypal", message));
        }

        let verdict = response.json::<VerifyResponse>().await?;
        debug!(status = %verdict.verification_status, "PayPal verification result");
        if verdict.verification_status != "SUCCESS" {
            warn!(transmission_id = %headers.transmission_id, "PayPal webhook failed verification");
        }
        Ok(verdict.verification_status == "SUCCESS")
    }
}

/// Capture id a refund belongs to, from its `up` link
fn capture_id_from_links(resource: &Value) -> Option<String> {
    resource
        .get("links")?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("up"))
        .and_then(|link| link.get("href").and_then(Value::as_str))
        .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
        .map(str::to_string)
}

/// Map a PayPal event type and its `resource` to a payment change
pub fn map_event(event_type: &str, resource: &Value) -> EventAction {
    let status = match event_type {
        "PAYMENT.CAPTURE.COMPLETED" => PaymentStatus::Completed,
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => PaymentStatus::Failed,
        "PAYMENT.CAPTURE.PENDING" => PaymentStatus::Processing,
        "PAYMENT.CAPTURE.REFUNDED" | "PAYMENT.CAPTURE.REVERSED" => PaymentStatus::Refunded,
        _ => return EventAction::Ignore,
    };

    let transaction_id = if status == PaymentStatus::Refunded {
        capture_id_from_links(resource)
            .or_else(|| resource.get("id").and_then(Value::as_str).map(str::to_string))
    } else {
        resource.get("id").and_then(Value::as_str).map(str::to_string)
    };

    match transaction_id {
        Some(transaction_id) => EventAction::Transition { transaction_id, status },
        None => EventAction::Ignore,
    }
}

/// Borrow a delivered body as raw JSON without reformatting it
pub fn raw_event(body: &[u8]) -> Result<&RawValue> {
    serde_json::from_slice(body)
        .map_err(|e| RivayaError::Validation(format!("Invalid PayPal event: {}", e)))
}

/// Parse a verified PayPal webhook body
pub fn parse_event(event: &RawValue) -> Result<GatewayEvent> {
    let body: Value = serde_json::from_str(event.get())
        .map_err(|e| RivayaError::Validation(format!("Invalid PayPal event: {}", e)))?;
    let event_id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| RivayaError::Validation("PayPal event without id".to_string()))?
        .to_string();
    let event_type = body
        .get("event_type")
        .and_then(Value::as_str)
        .ok_or_else(|| RivayaError::Validation("PayPal event without event_type".to_string()))?
        .to_string();

    let resource = body.get("resource").cloned().unwrap_or(Value::Null);
    let action = map_event(&event_type, &resource);

    Ok(GatewayEvent {
        gateway: PaymentGateway::Paypal,
        event_id,
        event_type,
        action,
        gateway_response: Some(resource),
        payload: body,
    })
}
