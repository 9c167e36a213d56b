//! Payment and payment webhook repository

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::payment::{
    GatewayTotal, Payment, PaymentGateway, PaymentStatus, PaymentWebhook, StatusTotal,
};
use crate::utils::errors::RivayaError;

const PAYMENT_COLUMNS: &str = "id, group_id, member_id, contribution_id, amount, currency, status, gateway, gateway_transaction_id, gateway_response, metadata, processed_at, failed_at, refunded_at, created_at, updated_at";

/// Fields of a payment row to insert
#[derive(Debug, Clone)]
pub struct NewPayment {
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
}

/// Result of asking for a status change
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied { from: PaymentStatus, payment: Payment },
    Unchanged(Payment),
    Refused { from: PaymentStatus, to: PaymentStatus },
}

/// Result of recording an inbound webhook
#[derive(Debug, Clone)]
pub enum WebhookRecord {
    /// First delivery, or an earlier delivery that never finished processing
    Pending(PaymentWebhook),
    /// Already fully processed
    Duplicate(PaymentWebhook),
}

#[derive(Clone, Debug)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a payment; a payment created `completed` settles its contribution
    pub async fn create(&self, payment: NewPayment) -> Result<Payment, RivayaError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let processed_at = (payment.status == PaymentStatus::Completed).then_some(now);

        let created = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (id, group_id, member_id, contribution_id, amount, currency, status, gateway, gateway_transaction_id, gateway_response, metadata, processed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(payment.group_id)
        .bind(payment.member_id)
        .bind(payment.contribution_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status)
        .bind(payment.gateway)
        .bind(&payment.gateway_transaction_id)
        .bind(&payment.gateway_response)
        .bind(&payment.metadata)
        .bind(processed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if crate::utils::errors::is_unique_violation(&e) {
                RivayaError::Conflict(
                    "A payment with this gateway transaction id already exists".to_string(),
                )
            } else {
                RivayaError::Database(e)
            }
        })?;

        if created.status == PaymentStatus::Completed {
            settle_contribution(&mut *tx, &created).await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, RivayaError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_gateway_transaction(
        &self,
        gateway: PaymentGateway,
        transaction_id: &str,
    ) -> Result<Option<Payment>, RivayaError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway = $1 AND gateway_transaction_id = $2"
        ))
        .bind(gateway)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Payments of a group, newest first, optionally narrowed to one member
    pub async fn list_for_group(
        &self,
        group_id: Uuid,
        member_id: Option<Uuid>,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), RivayaError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE group_id = $1
              AND ($2::uuid IS NULL OR member_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(group_id)
        .bind(member_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM payments
            WHERE group_id = $1
              AND ($2::uuid IS NULL OR member_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#
        )
        .bind(group_id)
        .bind(member_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok((payments, total.0))
    }

    /// Totals per status and per gateway, optionally for one `YYYY-MM` period
    pub async fn totals(
        &self,
        group_id: Uuid,
        period: Option<&str>,
    ) -> Result<(Vec<StatusTotal>, Vec<GatewayTotal>), RivayaError> {
        let by_status = sqlx::query_as::<_, StatusTotal>(
            r#"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount
            FROM payments
            WHERE group_id = $1
              AND ($2::text IS NULL OR to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM') = $2)
            GROUP BY status
            ORDER BY status
            "#
        )
        .bind(group_id)
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        let by_gateway = sqlx::query_as::<_, GatewayTotal>(
            r#"
            SELECT gateway, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount
            FROM payments
            WHERE group_id = $1 AND status = 'completed'
              AND ($2::text IS NULL OR to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM') = $2)
            GROUP BY gateway
            ORDER BY gateway
            "#
        )
        .bind(group_id)
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        Ok((by_status, by_gateway))
    }

    /// Move a payment to `next` under a row lock, updating its contribution
    ///
    /// `gateway_response`, when given, replaces the stored gateway payload.
    pub async fn transition(
        &self,
        payment_id: Uuid,
        next: PaymentStatus,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<TransitionOutcome, RivayaError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RivayaError::not_found("Payment", payment_id))?;

        let from = current.status;
        if from == next {
            return Ok(TransitionOutcome::Unchanged(current));
        }
        if !from.can_transition_to(next) {
            return Ok(TransitionOutcome::Refused { from, to: next });
        }

        let now = Utc::now();
        let updated = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                gateway_response = COALESCE($3, gateway_response),
                processed_at = CASE WHEN $2 = 'completed' THEN $4 ELSE processed_at END,
                failed_at = CASE WHEN $2 = 'failed' THEN $4 ELSE failed_at END,
                refunded_at = CASE WHEN $2 = 'refunded' THEN $4 ELSE refunded_at END,
                updated_at = $4
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(next)
        .bind(gateway_response)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        match next {
            PaymentStatus::Completed => settle_contribution(&mut *tx, &updated).await?,
            PaymentStatus::Refunded => reopen_contribution(&mut *tx, &updated).await?,
            _ => {}
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied { from, payment: updated })
    }

    /// Record an inbound webhook keyed by (gateway, event id)
    pub async fn record_webhook(
        &self,
        gateway: PaymentGateway,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<WebhookRecord, RivayaError> {
        let inserted = sqlx::query_as::<_, PaymentWebhook>(
            r#"
            INSERT INTO payment_webhooks (id, gateway, event_id, event_type, payload, is_processed, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            ON CONFLICT (gateway, event_id) DO NOTHING
            RETURNING id, gateway, event_id, event_type, payload, is_processed, processed_at, error_message, created_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(gateway)
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(webhook) = inserted {
            return Ok(WebhookRecord::Pending(webhook));
        }

        let existing = sqlx::query_as::<_, PaymentWebhook>(
            "SELECT id, gateway, event_id, event_type, payload, is_processed, processed_at, error_message, created_at FROM payment_webhooks WHERE gateway = $1 AND event_id = $2"
        )
        .bind(gateway)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        if existing.is_processed {
            Ok(WebhookRecord::Duplicate(existing))
        } else {
            Ok(WebhookRecord::Pending(existing))
        }
    }

    /// Mark a webhook processed, keeping an optional note about why nothing changed
    pub async fn mark_webhook_processed(&self, id: Uuid, error_message: Option<&str>) -> Result<(), RivayaError> {
        sqlx::query(
            "UPDATE payment_webhooks SET is_processed = TRUE, processed_at = $2, error_message = $3 WHERE id = $1"
        )
        .bind(id)
        .bind(Utc::now())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_webhook(&self, gateway: PaymentGateway, event_id: &str) -> Result<Option<PaymentWebhook>, RivayaError> {
        let webhook = sqlx::query_as::<_, PaymentWebhook>(
            "SELECT id, gateway, event_id, event_type, payload, is_processed, processed_at, error_message, created_at FROM payment_webhooks WHERE gateway = $1 AND event_id = $2"
        )
        .bind(gateway)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }
}

/// Mark the payment's contribution paid if it is still outstanding
async fn settle_contribution(conn: &mut PgConnection, payment: &Payment) -> Result<(), RivayaError> {
    if let Some(contribution_id) = payment.contribution_id {
        sqlx::query(
            r#"
            UPDATE contributions
            SET status = 'paid', paid_at = $2, payment_id = $3, updated_at = $2
            WHERE id = $1 AND status IN ('pending', 'overdue')
            "#
        )
        .bind(contribution_id)
        .bind(Utc::now())
        .bind(payment.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Return a contribution settled by this payment to pending
async fn reopen_contribution(conn: &mut PgConnection, payment: &Payment) -> Result<(), RivayaError> {
    if let Some(contribution_id) = payment.contribution_id {
        sqlx::query(
            r#"
            UPDATE contributions
            SET status = 'pending', paid_at = NULL, payment_id = NULL, updated_at = $3
            WHERE id = $1 AND status = 'paid' AND payment_id = $2
            "#
        )
        .bind(contribution_id)
        .bind(payment.id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
