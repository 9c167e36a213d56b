//! Payment, webhook and refund models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    Disputed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Disputed => "disputed",
        }
    }

    /// Whether a gateway notification may move a payment from `self` to `next`
    ///
    /// A transition to the same status is not listed here; callers treat it
    /// as a no-op.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, next),
            (Pending, Processing | Completed | Failed | Cancelled)
                | (Processing, Completed | Failed | Cancelled)
                | (Failed, Processing | Completed)
                | (Completed, Refunded | Disputed)
                | (Disputed, Completed | Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Cancelled | PaymentStatus::Refunded)
    }

    /// Only completed payments may be refunded on request
    ///
    /// A disputed payment reaches `refunded` through the gateway alone.
    pub fn ensure_refundable(&self) -> Result<()> {
        if *self == PaymentStatus::Completed {
            return Ok(());
        }
        Err(RivayaError::InvalidStateTransition {
            from: self.as_str().to_string(),
            to: PaymentStatus::Refunded.as_str().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Stripe,
    Mpesa,
    Paypal,
    BankTransfer,
    Cash,
    Other,
}

impl PaymentGateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentGateway::Stripe => "stripe",
            PaymentGateway::Mpesa => "mpesa",
            PaymentGateway::Paypal => "paypal",
            PaymentGateway::BankTransfer => "bank_transfer",
            PaymentGateway::Cash => "cash",
            PaymentGateway::Other => "other",
        }
    }

    /// Gateways whose outcome arrives later through a webhook
    pub fn is_online(&self) -> bool {
        matches!(
            self,
            PaymentGateway::Stripe | PaymentGateway::Mpesa | PaymentGateway::Paypal
        )
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stripe" => Some(PaymentGateway::Stripe),
            "mpesa" => Some(PaymentGateway::Mpesa),
            "paypal" => Some(PaymentGateway::Paypal),
            "bank_transfer" => Some(PaymentGateway::BankTransfer),
            "cash" => Some(PaymentGateway::Cash),
            "other" => Some(PaymentGateway::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub contribution_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub gateway: PaymentGateway,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored record of one inbound gateway notification
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhook {
    pub id: Uuid,
    pub gateway: PaymentGateway,
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub is_processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub gateway: PaymentGateway,
    pub contribution_id: Option<Uuid>,
    /// Payer when a finance role records an offline payment
    pub member_id: Option<Uuid>,
    /// Reference obtained client-side for M-Pesa and PayPal
    pub gateway_transaction_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreatePaymentRequest {
    pub fn validate(&self) -> Result<()> {
        crate::models::contribution::validate_positive_amount(self.amount)?;
        if self.amount.scale() > 2 {
            return Err(RivayaError::Validation(
                "Amount must have at most 2 decimal places".to_string(),
            ));
        }
        if let Some(currency) = &self.currency {
            helpers::normalize_currency(currency)?;
        }
        if matches!(&self.metadata, Some(m) if !m.is_object()) {
            return Err(RivayaError::Validation("Metadata must be a JSON object".to_string()));
        }
        match self.gateway {
            PaymentGateway::Mpesa | PaymentGateway::Paypal => {
                let reference = self.gateway_transaction_id.as_deref().unwrap_or("").trim();
                if reference.is_empty() {
                    return Err(RivayaError::Validation(format!(
                        "A gateway transaction id is required for {}",
                        self.gateway.as_str()
                    )));
                }
            }
            PaymentGateway::Stripe => {
                if self.gateway_transaction_id.is_some() {
                    return Err(RivayaError::Validation(
                        "Stripe payment intents are created by the server".to_string(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Payment plus what the client needs to complete it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub payment: Payment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub reason: String,
}

impl RefundRequest {
    pub fn validate(&self) -> Result<()> {
        helpers::require_length("Refund reason", &self.reason, 1, 200)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaymentSummaryQuery {
    /// `YYYY-MM`; all time when absent
    pub period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotal {
    pub status: PaymentStatus,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayTotal {
    pub gateway: PaymentGateway,
    pub count: i64,
    pub amount: Decimal,
}

/// Aggregated payment figures for one group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub group_id: Uuid,
    pub period: Option<String>,
    pub total_collected: Decimal,
    pub completed_payments: i64,
    pub failed_payments: i64,
    pub pending_payments: i64,
    pub average_payment_amount: Decimal,
    pub by_status: Vec<StatusTotal>,
    pub by_gateway: Vec<GatewayTotal>,
}

impl PaymentSummary {
    pub fn from_totals(
        group_id: Uuid,
        period: Option<String>,
        by_status: Vec<StatusTotal>,
        by_gateway: Vec<GatewayTotal>,
    ) -> Self {
        let count_of = |status: PaymentStatus| {
            by_status
                .iter()
                .filter(|t| t.status == status)
                .map(|t| t.count)
                .sum::<i64>()
        };
        let completed = by_status
            .iter()
            .find(|t| t.status == PaymentStatus::Completed);
        let total_collected = completed.map(|t| t.amount).unwrap_or(Decimal::ZERO);
        let completed_payments = count_of(PaymentStatus::Completed);
        let average_payment_amount = if completed_payments > 0 {
            (total_collected / Decimal::from(completed_payments)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            group_id,
            period,
            total_collected,
            completed_payments,
            failed_payments: count_of(PaymentStatus::Failed),
            pending_payments: count_of(PaymentStatus::Pending) + count_of(PaymentStatus::Processing),
            average_payment_amount,
            by_status,
            by_gateway,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    #[test]
    fn test_transition_table() {
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Refunded));
        assert!(Completed.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Completed));

        assert!(!Completed.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let all = [Pending, Processing, Completed, Failed, Cancelled, Refunded, Disputed];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_only_completed_payments_are_refundable() {
        assert!(Completed.ensure_refundable().is_ok());

        let err = Disputed.ensure_refundable().unwrap_err();
        assert_eq!(err.to_string(), "Invalid state transition: disputed -> refunded");

        for status in [Pending, Processing, Failed, Cancelled, Refunded] {
            assert!(matches!(
                status.ensure_refundable(),
                Err(RivayaError::InvalidStateTransition { .. })
            ));
        }
    }

    #[test]
    fn test_payment_request_gateway_rules() {
        let request = CreatePaymentRequest {
            amount: Decimal::new(5000, 2),
            currency: Some("USD".to_string()),
            gateway: PaymentGateway::Mpesa,
            contribution_id: None,
            member_id: None,
            gateway_transaction_id: None,
            metadata: None,
        };
        assert!(request.validate().is_err());

        let with_reference = CreatePaymentRequest {
            gateway_transaction_id: Some("ws_CO_123".to_string()),
            ..request.clone()
        };
        assert!(with_reference.validate().is_ok());

        let stripe_with_reference = CreatePaymentRequest {
            gateway: PaymentGateway::Stripe,
            ..with_reference.clone()
        };
        assert!(stripe_with_reference.validate().is_err());

        let fractional = CreatePaymentRequest {
            amount: Decimal::new(1001, 3),
            ..with_reference
        };
        assert!(fractional.validate().is_err());
    }

    #[test]
    fn test_summary_from_totals() {
        let group_id = Uuid::new_v4();
        let summary = PaymentSummary::from_totals(
            group_id,
            Some("2024-06".to_string()),
            vec![
                StatusTotal { status: Completed, count: 3, amount: Decimal::new(300, 0) },
                StatusTotal { status: Failed, count: 1, amount: Decimal::new(50, 0) },
                StatusTotal { status: Processing, count: 2, amount: Decimal::new(20, 0) },
            ],
            vec![],
        );
        assert_eq!(summary.total_collected, Decimal::new(300, 0));
        assert_eq!(summary.completed_payments, 3);
        assert_eq!(summary.failed_payments, 1);
        assert_eq!(summary.pending_payments, 2);
        assert_eq!(summary.average_payment_amount, Decimal::new(100, 0));
    }

    #[test]
    fn test_gateway_parse() {
        assert_eq!(PaymentGateway::parse("mpesa"), Some(PaymentGateway::Mpesa));
        assert_eq!(PaymentGateway::parse("bank_transfer"), Some(PaymentGateway::BankTransfer));
        assert_eq!(PaymentGateway::parse("venmo"), None);
        assert!(PaymentGateway::Stripe.is_online());
        assert!(!PaymentGateway::Cash.is_online());
    }
}
