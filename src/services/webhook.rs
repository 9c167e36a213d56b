//! Payment webhook reconciliation
//!
//! Every gateway's notification is reduced to a [`GatewayEvent`] and then
//! reconciled the same way: record the delivery, skip replays, look up the
//! payment and apply the status change if the transition table allows it.

use serde::Deserialize;
use serde_json::Value;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::database::repositories::payment::{TransitionOutcome, WebhookRecord};
use crate::database::PaymentRepository;
use crate::models::payment::{PaymentGateway, PaymentStatus};
use crate::services::{mpesa, paypal, stripe};
use crate::utils::errors::{Result, RivayaError};
use crate::utils::logging::{log_payment_event, log_webhook};

/// What a gateway notification asks for
#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    Transition {
        transaction_id: String,
        status: PaymentStatus,
    },
    /// Event type we do not act on
    Ignore,
}

/// Gateway notification reduced to the fields reconciliation needs
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub gateway: PaymentGateway,
    pub event_id: String,
    pub event_type: String,
    pub action: EventAction,
    /// Stored on the payment when a transition is applied
    pub gateway_response: Option<Value>,
    pub payload: Value,
}

/// Body of `POST /webhooks/payments`
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    pub gateway: String,
    pub event: String,
    pub data: Value,
}

/// Check the relay's shared secret header
pub fn authenticate_relay(provided: Option<&str>, expected: &str) -> Result<()> {
    match provided {
        Some(secret) if bool::from(secret.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(RivayaError::Authentication("Invalid webhook secret".to_string())),
    }
}

/// Turn a relayed notification into a gateway event using that gateway's mapping
pub fn parse_relay(request: RelayRequest) -> Result<GatewayEvent> {
    let gateway = PaymentGateway::parse(&request.gateway)
        .filter(PaymentGateway::is_online)
        .ok_or_else(|| RivayaError::Validation(format!("Unsupported gateway: {}", request.gateway)))?;

    let payload = serde_json::json!({
        "gateway": request.gateway,
        "event": request.event,
        "data": request.data,
    });

    if gateway == PaymentGateway::Mpesa {
        let mut event = mpesa::parse_stk_callback(&request.data, payload)?;
        event.event_id = format!("{}:{}", request.event, event.event_id);
        event.event_type = request.event;
        return Ok(event);
    }

    let data_id = request
        .data
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| RivayaError::Validation("Relayed event data without id".to_string()))?;

    let action = match gateway {
        PaymentGateway::Stripe => stripe::map_event(&request.event, &request.data),
        _ => paypal::map_event(&request.event, &request.data),
    };

    Ok(GatewayEvent {
        gateway,
        event_id: format!("{}:{}", request.event, data_id),
        event_type: request.event,
        action,
        gateway_response: Some(request.data),
        payload,
    })
}

/// How a delivery was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Duplicate,
    Ignored,
    PaymentNotFound,
    Unchanged { payment_id: Uuid },
    Applied { payment_id: Uuid, from: PaymentStatus, to: PaymentStatus },
    Refused { payment_id: Uuid, from: PaymentStatus, to: PaymentStatus },
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::PaymentNotFound => "payment_not_found",
            WebhookOutcome::Unchanged { .. } => "processed",
            WebhookOutcome::Applied { .. } => "processed",
            WebhookOutcome::Refused { .. } => "refused",
        }
    }
}

/// Reconciles gateway notifications against stored payments
#[derive(Clone, Debug)]
pub struct WebhookService {
    payments: PaymentRepository,
}

impl WebhookService {
    pub fn new(payments: PaymentRepository) -> Self {
        Self { payments }
    }

    pub async fn reconcile(&self, event: GatewayEvent) -> Result<WebhookOutcome> {
        let gateway = event.gateway.as_str();

        let webhook = match self
            .payments
            .record_webhook(event.gateway, &event.event_id, &event.event_type, &event.payload)
            .await?
        {
            WebhookRecord::Duplicate(_) => {
                log_webhook(gateway, &event.event_type, &event.event_id, "duplicate");
                return Ok(WebhookOutcome::Duplicate);
            }
            WebhookRecord::Pending(webhook) => webhook,
        };

        let (outcome, note) = self.apply(&event).await?;

        self.payments
            .mark_webhook_processed(webhook.id, note.as_deref())
            .await?;
        log_webhook(gateway, &event.event_type, &event.event_id, outcome.as_str());

        Ok(outcome)
    }

    async fn apply(&self, event: &GatewayEvent) -> Result<(WebhookOutcome, Option<String>)> {
        let (transaction_id, status) = match &event.action {
            EventAction::Ignore => return Ok((WebhookOutcome::Ignored, None)),
            EventAction::Transition { transaction_id, status } => (transaction_id, *status),
        };

        let Some(payment) = self
            .payments
            .find_by_gateway_transaction(event.gateway, transaction_id)
            .await?
        else {
            return Ok((
                WebhookOutcome::PaymentNotFound,
                Some(format!("No payment for transaction {}", transaction_id)),
            ));
        };

        let outcome = match self
            .payments
            .transition(payment.id, status, event.gateway_response.clone())
            .await?
        {
            TransitionOutcome::Applied { from, payment } => {
                log_payment_event(payment.id, event.gateway.as_str(), from.as_str(), status.as_str());
                (
                    WebhookOutcome::Applied { payment_id: payment.id, from, to: status },
                    None,
                )
            }
            TransitionOutcome::Unchanged(payment) => {
                (WebhookOutcome::Unchanged { payment_id: payment.id }, None)
            }
            TransitionOutcome::Refused { from, to } => (
                WebhookOutcome::Refused { payment_id: payment.id, from, to },
                Some(format!("Transition {} -> {} not allowed", from.as_str(), to.as_str())),
            ),
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relay_secret() {
        assert!(authenticate_relay(Some("relay-secret"), "relay-secret").is_ok());
        assert!(matches!(
            authenticate_relay(Some("relay-secreT"), "relay-secret"),
            Err(RivayaError::Authentication(_))
        ));
        assert!(authenticate_relay(Some("relay"), "relay-secret").is_err());
        assert!(authenticate_relay(None, "relay-secret").is_err());
    }

    #[test]
    fn test_relay_stripe() {
        let event = parse_relay(RelayRequest {
            gateway: "stripe".to_string(),
            event: "payment_intent.succeeded".to_string(),
            data: json!({"id": "pi_1"}),
        })
        .unwrap();
        assert_eq!(event.event_id, "payment_intent.succeeded:pi_1");
        assert_eq!(
            event.action,
            EventAction::Transition {
                transaction_id: "pi_1".to_string(),
                status: PaymentStatus::Completed
            }
        );
    }

    #[test]
    fn test_relay_paypal_and_mpesa() {
        let event = parse_relay(RelayRequest {
            gateway: "paypal".to_string(),
            event: "PAYMENT.CAPTURE.DENIED".to_string(),
            data: json!({"id": "CAP-2"}),
        })
        .unwrap();
        assert_eq!(event.gateway, PaymentGateway::Paypal);
        assert!(matches!(event.action, EventAction::Transition { status: PaymentStatus::Failed, .. }));

        let event = parse_relay(RelayRequest {
            gateway: "mpesa".to_string(),
            event: "stk_callback".to_string(),
            data: json!({"CheckoutRequestID": "ws_CO_1", "ResultCode": 1032}),
        })
        .unwrap();
        assert_eq!(event.event_id, "stk_callback:ws_CO_1");
        assert!(matches!(event.action, EventAction::Transition { status: PaymentStatus::Cancelled, .. }));
    }

    #[test]
    fn test_relay_rejects_unknown_gateway_and_missing_id() {
        let unknown = parse_relay(RelayRequest {
            gateway: "venmo".to_string(),
            event: "x".to_string(),
            data: json!({"id": "1"}),
        });
        assert!(matches!(unknown, Err(RivayaError::Validation(_))));

        let offline = parse_relay(RelayRequest {
            gateway: "cash".to_string(),
            event: "x".to_string(),
            data: json!({"id": "1"}),
        });
        assert!(offline.is_err());

        let missing_id = parse_relay(RelayRequest {
            gateway: "stripe".to_string(),
            event: "payment_intent.succeeded".to_string(),
            data: json!({}),
        });
        assert!(missing_id.is_err());
    }

    #[test]
    fn test_relay_ignored_event() {
        let event = parse_relay(RelayRequest {
            gateway: "stripe".to_string(),
            event: "customer.updated".to_string(),
            data: json!({"id": "cus_1"}),
        })
        .unwrap();
        assert_eq!(event.action, EventAction::Ignore);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(WebhookOutcome::Duplicate.as_str(), "duplicate");
        assert_eq!(WebhookOutcome::PaymentNotFound.as_str(), "payment_not_found");
        let id = Uuid::new_v4();
        assert_eq!(
            WebhookOutcome::Refused { payment_id: id, from: PaymentStatus::Completed, to: PaymentStatus::Failed }.as_str(),
            "refused"
        );
    }
}
