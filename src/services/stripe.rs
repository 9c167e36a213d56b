//! Stripe integration
//!
//! Webhook signature verification, event mapping and the handful of REST
//! calls needed to take card payments: customers, payment intents, refunds.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::PaymentsConfig;
use crate::models::payment::{PaymentGateway, PaymentStatus};
use crate::services::webhook::{EventAction, GatewayEvent};
use crate::utils::errors::{Result, RivayaError};
use crate::utils::logging::log_api_error;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header against the raw request body
///
/// The header carries `t=<unix seconds>` and one or more `v1=<hex>`
/// signatures; any matching `v1` is accepted.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| RivayaError::WebhookSignature("Malformed signature header".to_string()))?;
        match key {
            "t" => {
                timestamp = Some(value.parse().map_err(|_| {
                    RivayaError::WebhookSignature("Malformed signature timestamp".to_string())
                })?)
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| RivayaError::WebhookSignature("Missing signature timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(RivayaError::WebhookSignature("Missing v1 signature".to_string()));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(RivayaError::WebhookSignature(
            "Signature timestamp outside tolerance".to_string(),
        ));
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| RivayaError::Config(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(RivayaError::WebhookSignature("No matching signature".to_string()))
}

/// Compute the header value Stripe would send for `payload`
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| RivayaError::Config(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// Map a Stripe event type and its `data.object` to a payment change
pub fn map_event(event_type: &str, object: &Value) -> EventAction {
    let (status, transaction_field) = match event_type {
        "payment_intent.succeeded" => (PaymentStatus::Completed, "id"),
        "payment_intent.payment_failed" => (PaymentStatus::Failed, "id"),
        "payment_intent.processing" => (PaymentStatus::Processing, "id"),
        "payment_intent.canceled" => (PaymentStatus::Cancelled, "id"),
        "charge.refunded" => (PaymentStatus::Refunded, "payment_intent"),
        "charge.dispute.created" => (PaymentStatus::Disputed, "payment_intent"),
        _ => return EventAction::Ignore,
    };

    match object.get(transaction_field).and_then(Value::as_str) {
        Some(transaction_id) => EventAction::Transition {
            transaction_id: transaction_id.to_string(),
            status,
        },
        None => EventAction::Ignore,
    }
}

/// Parse a verified Stripe event body
pub fn parse_event(payload: &[u8]) -> Result<GatewayEvent> {
    let body: Value = serde_json::from_slice(payload)
        .map_err(|e| RivayaError::Validation(format!("Invalid Stripe event: {}", e)))?;

    let event_id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| RivayaError::Validation("Stripe event without id".to_string()))?
        .to_string();
    let event_type = body
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RivayaError::Validation("Stripe event without type".to_string()))?
        .to_string();

    let object = body.pointer("/data/object").cloned().unwrap_or(Value::Null);
    let action = map_event(&event_type, &object);

    Ok(GatewayEvent {
        gateway: PaymentGateway::Stripe,
        event_id,
        event_type,
        action,
        gateway_response: Some(object),
        payload: body,
    })
}

/// Amount in the currency's minor unit
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| RivayaError::Validation("Amount is out of range".to_string()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Minimal Stripe REST client
#[derive(Clone, Debug)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeClient {
    pub fn new(config: &PaymentsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("RIVAYA-API/1.0")
            .build()?;

        Ok(Self {
            client,
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.secret_key.is_some()
    }

    fn secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| RivayaError::FeatureDisabled("Stripe payments are not configured".to_string()))
    }

    async fn post_form<T>(&self, path: &str, form: &[(&str, String)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.api_base, path);
        debug!(url = %url, "Calling Stripe");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key()?)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            log_api_error("stripe", &message, Some(path));
            return Err(RivayaError::gateway("stripe", message));
        }

        Ok(response.json::<T>().await?)
    }

    /// Create a customer and return its id
    pub async fn create_customer(&self, email: &str, name: &str, user_id: &str) -> Result<String> {
        let customer: StripeCustomer = self
            .post_form(
                "/v1/customers",
                &[
                    ("email", email.to_string()),
                    ("name", name.to_string()),
                    ("metadata[user_id]", user_id.to_string()),
                ],
            )
            .await?;

        info!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    /// Create a payment intent for `amount` in `currency`
    pub async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        customer_id: &str,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent> {
        let mut form = vec![
            ("amount", to_minor_units(amount)?.to_string()),
            ("currency", currency.to_lowercase()),
            ("customer", customer_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let metadata_keys: Vec<String> = metadata
            .iter()
            .map(|(key, _)| format!("metadata[{}]", key))
            .collect();
        for (key, (_, value)) in metadata_keys.iter().zip(metadata.iter()) {
            form.push((key.as_str(), value.clone()));
        }

        let intent: PaymentIntent = self.post_form("/v1/payment_intents", &form).await?;
        info!(payment_intent = %intent.id, status = %intent.status, "Stripe payment intent created");
        Ok(intent)
    }

    /// Refund a payment intent in full
    pub async fn refund(&self, payment_intent: &str, reason: &str) -> Result<StripeRefund> {
        let refund: StripeRefund = self
            .post_form(
                "/v1/refunds",
                &[
                    ("payment_intent", payment_intent.to_string()),
                    ("reason", "requested_by_customer".to_string()),
                    ("metadata[reason]", reason.to_string()),
                ],
            )
            .await?;

        info!(refund_id = %refund.id, status = %refund.status, "Stripe refund created");
        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let now = 1_700_000_000;
        let header = sign_payload(payload, SECRET, now).unwrap();
        assert!(verify_signature(payload, &header, SECRET, now + 10).is_ok());
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let good = sign_payload(payload, SECRET, now).unwrap();
        let v1 = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", now, "00".repeat(32), v1);
        assert!(verify_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_bad_signatures_rejected() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let header = sign_payload(payload, SECRET, now).unwrap();

        assert!(verify_signature(payload, &header, "whsec_other", now).is_err());
        assert!(verify_signature(b"{ }", &header, SECRET, now).is_err());
        assert!(verify_signature(payload, &header, SECRET, now + SIGNATURE_TOLERANCE_SECS + 1).is_err());
        assert!(verify_signature(payload, "garbage", SECRET, now).is_err());
        assert!(verify_signature(payload, &format!("t={}", now), SECRET, now).is_err());
        assert!(verify_signature(payload, "t=abc,v1=00", SECRET, now).is_err());
    }

    #[test]
    fn test_event_mapping() {
        let intent = json!({"id": "pi_123", "object": "payment_intent"});
        let charge = json!({"id": "ch_1", "payment_intent": "pi_123"});

        let cases = [
            ("payment_intent.succeeded", &intent, PaymentStatus::Completed),
            ("payment_intent.payment_failed", &intent, PaymentStatus::Failed),
            ("payment_intent.processing", &intent, PaymentStatus::Processing),
            ("payment_intent.canceled", &intent, PaymentStatus::Cancelled),
            ("charge.refunded", &charge, PaymentStatus::Refunded),
            ("charge.dispute.created", &charge, PaymentStatus::Disputed),
        ];
        for (event_type, object, expected) in cases {
            match map_event(event_type, object) {
                EventAction::Transition { transaction_id, status } => {
                    assert_eq!(transaction_id, "pi_123");
                    assert_eq!(status, expected);
                }
                EventAction::Ignore => panic!("{} should map", event_type),
            }
        }

        assert!(matches!(map_event("customer.created", &intent), EventAction::Ignore));
        assert!(matches!(map_event("charge.refunded", &json!({})), EventAction::Ignore));
    }

    #[test]
    fn test_parse_event() {
        let body = json!({
            "id": "evt_42",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_9"}}
        });
        let event = parse_event(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.event_id, "evt_42");
        assert_eq!(event.gateway, PaymentGateway::Stripe);
        assert!(matches!(event.action, EventAction::Transition { ref transaction_id, .. } if transaction_id == "pi_9"));

        assert!(parse_event(b"not json").is_err());
        assert!(parse_event(br#"{"type":"x"}"#).is_err());
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(1050, 2)).unwrap(), 1050);
        assert_eq!(to_minor_units(Decimal::new(1, 0)).unwrap(), 100);
        assert_eq!(to_minor_units(Decimal::new(12345, 3)).unwrap(), 1234);
    }
}
