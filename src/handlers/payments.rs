//! Payments, refunds and group payment summaries

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::extract::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::utils::errors::Result;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups/:id/payments", post(initiate_payment).get(list_payments))
        .route("/groups/:id/payments/summary", get(payment_summary))
        .route("/payments/:id", get(get_payment))
        .route("/payments/:id/refund", post(refund_payment))
}

async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Created<PaymentInitiation>> {
    let initiation = state
        .services
        .payment_service
        .initiate(group_id, user.id, request)
        .await?;
    Ok(Created(ApiResponse::ok(initiation)))
}

async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<PaymentListQuery>,
) -> Result<ApiResponse<Paginated<Payment>>> {
    let payments = state.services.payment_service.list(group_id, user.id, query).await?;
    Ok(ApiResponse::ok(payments))
}

async fn payment_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<PaymentSummaryQuery>,
) -> Result<ApiResponse<PaymentSummary>> {
    let summary = state.services.payment_service.summary(group_id, user.id, query).await?;
    Ok(ApiResponse::ok(summary))
}

async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> Result<ApiResponse<Payment>> {
    let payment = state.services.payment_service.get(payment_id, user.id).await?;
    Ok(ApiResponse::ok(payment))
}

async fn refund_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<ApiResponse<Payment>> {
    let payment = state
        .services
        .payment_service
        .refund(payment_id, user.id, request)
        .await?;
    Ok(ApiResponse::with_message(payment, "Refund requested"))
}
