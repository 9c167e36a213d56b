//! Payment initiation, refunds and reporting

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::database::repositories::payment::{NewPayment, TransitionOutcome};
use crate::database::DatabaseService;
use crate::models::*;
use crate::services::stripe::StripeClient;
use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;
use crate::utils::logging::{log_group_event, log_payment_event};

#[derive(Clone, Debug)]
pub struct PaymentService {
    db: DatabaseService,
    stripe: StripeClient,
}

impl PaymentService {
    pub fn new(db: DatabaseService, stripe: StripeClient) -> Self {
        Self { db, stripe }
    }

    /// Start or record a payment into a group
    pub async fn initiate(
        &self,
        group_id: Uuid,
        actor: Uuid,
        request: CreatePaymentRequest,
    ) -> Result<PaymentInitiation> {
        request.validate()?;
        let (group, member) = self.db.require_member(group_id, actor).await?;
        if group.status != GroupStatus::Active {
            return Err(RivayaError::Conflict("Group is not active".to_string()));
        }

        let payer = if request.gateway.is_online() {
            match request.member_id {
                Some(member_id) if member_id != actor => {
                    return Err(RivayaError::Validation(
                        "Online payments can only be made for yourself".to_string(),
                    ))
                }
                _ => actor,
            }
        } else {
            if !member.role.allows(GroupPermission::ManageFinances) {
                return Err(RivayaError::PermissionDenied(
                    "Only finance roles may record offline payments".to_string(),
                ));
            }
            let payer = request.member_id.unwrap_or(actor);
            if self.db.groups.find_member(group_id, payer).await?.is_none() {
                return Err(RivayaError::Validation(
                    "The payer does not belong to this group".to_string(),
                ));
            }
            payer
        };

        let currency = match &request.currency {
            Some(currency) => helpers::normalize_currency(currency)?,
            None => group.currency.clone(),
        };

        if let Some(contribution_id) = request.contribution_id {
            let contribution = self
                .db
                .contributions
                .find_by_id(contribution_id)
                .await?
                .filter(|c| c.group_id == group_id)
                .ok_or_else(|| RivayaError::not_found("Contribution", contribution_id))?;
            if contribution.member_id != payer {
                return Err(RivayaError::Validation(
                    "The contribution belongs to another member".to_string(),
                ));
            }
            if !contribution.status.is_outstanding() {
                return Err(RivayaError::Conflict(format!(
                    "Contribution is already {}",
                    contribution.status.as_str()
                )));
            }
        }

        let metadata = request.metadata.clone().unwrap_or_else(|| json!({}));
        let mut new_payment = NewPayment {
            group_id,
            member_id: payer,
            contribution_id: request.contribution_id,
            amount: request.amount,
            currency,
            status: PaymentStatus::Pending,
            gateway: request.gateway,
            gateway_transaction_id: request
                .gateway_transaction_id
                .as_deref()
                .map(str::trim)
                .map(str::to_string),
            gateway_response: None,
            metadata,
        };

        let mut client_secret = None;
        match request.gateway {
            PaymentGateway::Stripe => {
                let customer_id = self.stripe_customer(payer).await?;
                let mut intent_metadata = vec![
                    ("group_id", group_id.to_string()),
                    ("user_id", payer.to_string()),
                ];
                if let Some(contribution_id) = request.contribution_id {
                    intent_metadata.push(("contribution_id", contribution_id.to_string()));
                }

                let intent = self
                    .stripe
                    .create_payment_intent(
                        new_payment.amount,
                        &new_payment.currency,
                        &customer_id,
                        &intent_metadata,
                    )
                    .await?;

                new_payment.gateway_transaction_id = Some(intent.id.clone());
                new_payment.gateway_response = Some(json!({ "id": intent.id, "status": intent.status }));
                client_secret = intent.client_secret;
            }
            PaymentGateway::Mpesa | PaymentGateway::Paypal => {}
            PaymentGateway::BankTransfer | PaymentGateway::Cash | PaymentGateway::Other => {
                new_payment.status = PaymentStatus::Completed;
                new_payment.metadata["recordedBy"] = json!(actor);
            }
        }

        let payment = self.db.payments.create(new_payment).await?;
        log_group_event(
            group_id,
            "payment_created",
            Some(actor),
            Some(payment.gateway.as_str()),
        );

        Ok(PaymentInitiation {
            payment,
            client_secret,
        })
    }

    /// Existing Stripe customer for a user, creating one on first use
    async fn stripe_customer(&self, user_id: Uuid) -> Result<String> {
        let user = self
            .db
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| RivayaError::not_found("User", user_id))?;

        if let Some(customer_id) = user.stripe_customer_id {
            return Ok(customer_id);
        }

        let customer_id = self
            .stripe
            .create_customer(&user.email, &user.full_name, &user.id.to_string())
            .await?;
        self.db.users.set_stripe_customer_id(user.id, &customer_id).await?;
        Ok(customer_id)
    }

    /// Load a payment the caller may see
    pub async fn get(&self, payment_id: Uuid, actor: Uuid) -> Result<Payment> {
        let payment = self
            .db
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| RivayaError::not_found("Payment", payment_id))?;

        let (_, member) = self.db.require_member(payment.group_id, actor).await?;
        if payment.member_id != actor && !member.role.allows(GroupPermission::ManageFinances) {
            return Err(RivayaError::not_found("Payment", payment_id));
        }

        Ok(payment)
    }

    /// Payments of a group; members without a finance role see only their own
    pub async fn list(
        &self,
        group_id: Uuid,
        actor: Uuid,
        query: PaymentListQuery,
    ) -> Result<Paginated<Payment>> {
        let (_, member) = self.db.require_member(group_id, actor).await?;
        let only_member = (!member.role.allows(GroupPermission::ManageFinances)).then_some(actor);

        let params = PaginationParams { page: query.page, limit: query.limit };
        let (payments, total) = self
            .db
            .payments
            .list_for_group(group_id, only_member, query.status, params.limit() as i64, params.offset())
            .await?;

        Ok(Paginated::new(payments, &params, total))
    }

    pub async fn summary(
        &self,
        group_id: Uuid,
        actor: Uuid,
        query: PaymentSummaryQuery,
    ) -> Result<PaymentSummary> {
        self.db
            .authorize(group_id, actor, GroupPermission::ManageFinances)
            .await?;
        if let Some(period) = &query.period {
            if !helpers::is_valid_period(period) {
                return Err(RivayaError::Validation(
                    "Period must be in YYYY-MM format".to_string(),
                ));
            }
        }

        let (by_status, by_gateway) = self
            .db
            .payments
            .totals(group_id, query.period.as_deref())
            .await?;

        Ok(PaymentSummary::from_totals(group_id, query.period, by_status, by_gateway))
    }

    /// Refund a completed payment
    ///
    /// Stripe refunds settle asynchronously through the `charge.refunded`
    /// webhook; every other gateway is marked refunded at once.
    pub async fn refund(&self, payment_id: Uuid, actor: Uuid, request: RefundRequest) -> Result<Payment> {
        request.validate()?;
        let payment = self
            .db
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| RivayaError::not_found("Payment", payment_id))?;
        self.db
            .authorize(payment.group_id, actor, GroupPermission::ManageFinances)
            .await?;

        payment.status.ensure_refundable()?;

        if payment.gateway == PaymentGateway::Stripe {
            let intent = payment.gateway_transaction_id.as_deref().ok_or_else(|| {
                RivayaError::Conflict("Payment has no Stripe payment intent".to_string())
            })?;
            let refund = self.stripe.refund(intent, &request.reason).await?;
            info!(payment_id = %payment.id, refund_id = %refund.id, "Stripe refund requested");
            return Ok(payment);
        }

        match self
            .db
            .payments
            .transition(payment.id, PaymentStatus::Refunded, None)
            .await?
        {
            TransitionOutcome::Applied { from, payment } => {
                log_payment_event(payment.id, payment.gateway.as_str(), from.as_str(), "refunded");
                Ok(payment)
            }
            TransitionOutcome::Unchanged(payment) => Ok(payment),
            TransitionOutcome::Refused { from, to } => Err(RivayaError::InvalidStateTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}
