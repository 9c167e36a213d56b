//! Contribution tiers and member contributions

use axum::extract::State;
use axum::routing::post;
use axum::Router;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::extract::{Json, Path, Query};
use crate::database::repositories::contribution::NewTier;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;
use crate::utils::logging::log_group_event;

use super::page_params;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups/:id/tiers", post(create_tier).get(list_tiers))
        .route(
            "/groups/:id/contributions",
            post(create_contribution).get(list_contributions),
        )
        .route("/contributions/:id/waive", post(waive_contribution))
}

async fn create_tier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreateTierRequest>,
) -> Result<Created<ContributionTier>> {
    request.validate()?;
    let (group, _) = state.db.authorize(group_id, user.id, GroupPermission::ManageFinances).await?;

    let currency = match &request.currency {
        Some(currency) => helpers::normalize_currency(currency)?,
        None => group.currency.clone(),
    };

    let tier = state
        .db
        .contributions
        .create_tier(NewTier {
            group_id,
            name: request.name.trim().to_string(),
            description: request.description,
            amount: request.amount,
            currency,
            frequency: request.frequency,
            is_default: request.is_default,
        })
        .await?;

    log_group_event(group_id, "tier_created", Some(user.id), Some(&tier.name));
    Ok(Created(ApiResponse::ok(tier)))
}

async fn list_tiers(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<ContributionTier>>> {
    state.db.require_member(group_id, user.id).await?;
    let tiers = state.db.contributions.list_tiers(group_id).await?;
    Ok(ApiResponse::ok(tiers))
}

async fn create_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreateContributionRequest>,
) -> Result<Created<Contribution>> {
    let (group, _) = state.db.authorize(group_id, user.id, GroupPermission::ManageFinances).await?;

    let contribution = state.db.create_contribution(&group, request).await?;
    log_group_event(group_id, "contribution_created", Some(user.id), Some(&contribution.period));
    Ok(Created(ApiResponse::ok(contribution)))
}

/// Finance roles see every contribution, members only their own
async fn list_contributions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ContributionListQuery>,
) -> Result<ApiResponse<Paginated<Contribution>>> {
    let (_, member) = state.db.require_member(group_id, user.id).await?;
    let only_member = (!member.role.allows(GroupPermission::ManageFinances)).then_some(user.id);

    let params = page_params(query.page, query.limit);
    let (contributions, total) = state
        .db
        .contributions
        .list_for_group(
            group_id,
            only_member,
            query.status,
            query.period.as_deref(),
            params.limit() as i64,
            params.offset(),
        )
        .await?;
    Ok(ApiResponse::ok(Paginated::new(contributions, &params, total)))
}

async fn waive_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(contribution_id): Path<Uuid>,
    request: Option<Json<WaiveRequest>>,
) -> Result<ApiResponse<Contribution>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    let contribution = state
        .db
        .contributions
        .find_by_id(contribution_id)
        .await?
        .ok_or_else(|| RivayaError::not_found("Contribution", contribution_id))?;
    state
        .db
        .authorize(contribution.group_id, user.id, GroupPermission::ManageFinances)
        .await?;

    let waived = state
        .db
        .contributions
        .waive(contribution_id, request.notes)
        .await?
        .ok_or_else(|| RivayaError::InvalidStateTransition {
            from: contribution.status.as_str().to_string(),
            to: "waived".to_string(),
        })?;

    log_group_event(contribution.group_id, "contribution_waived", Some(user.id), Some(&contribution.period));
    Ok(ApiResponse::ok(waived))
}
