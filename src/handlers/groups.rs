//! Groups and their members

use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::Router;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::extract::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::utils::errors::Result;
use crate::utils::logging::log_group_event;

use super::page_params;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups", post(create_group).get(my_groups))
        .route("/groups/search", get(search_groups))
        .route(
            "/groups/:id",
            get(get_group).patch(update_group).delete(archive_group),
        )
        .route("/groups/:id/members", get(list_members).post(add_member))
        .route(
            "/groups/:id/members/:user_id",
            patch(update_member).delete(remove_member),
        )
        .route("/groups/:id/join", post(join_group))
        .route("/groups/:id/leave", post(leave_group))
}

async fn create_group(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Created<Group>> {
    let group = state.db.create_group(user.id, request).await?;
    log_group_event(group.id, "created", Some(user.id), Some(&group.name));
    Ok(Created(ApiResponse::with_message(group, "Group created")))
}

async fn my_groups(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Paginated<Group>>> {
    let groups = state
        .db
        .groups
        .list_for_user(user.id, params.limit() as i64, params.offset())
        .await?;
    let total = state.db.groups.count_for_user(user.id).await?;
    Ok(ApiResponse::ok(Paginated::new(groups, &params, total)))
}

async fn search_groups(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<GroupSearchQuery>,
) -> Result<ApiResponse<Paginated<Group>>> {
    let params = page_params(query.page, query.limit);
    let (groups, total) = state
        .db
        .groups
        .search_public(query.q.as_deref(), query.group_type, params.limit() as i64, params.offset())
        .await?;
    Ok(ApiResponse::ok(Paginated::new(groups, &params, total)))
}

async fn get_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<GroupDetails>> {
    let details = state.db.group_details(group_id, user.id).await?;
    Ok(ApiResponse::ok(details))
}

async fn update_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<ApiResponse<Group>> {
    request.validate()?;
    state.db.authorize(group_id, user.id, GroupPermission::ManageGroup).await?;

    let group = state.db.groups.update(group_id, request).await?;
    log_group_event(group_id, "updated", Some(user.id), None);
    Ok(ApiResponse::ok(group))
}

async fn archive_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<Group>> {
    state.db.authorize(group_id, user.id, GroupPermission::Archive).await?;

    let group = state.db.groups.set_status(group_id, GroupStatus::Archived).await?;
    log_group_event(group_id, "archived", Some(user.id), None);
    Ok(ApiResponse::with_message(group, "Group archived"))
}

async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<MemberProfile>>> {
    state.db.require_member(group_id, user.id).await?;
    let members = state.db.groups.list_members(group_id).await?;
    Ok(ApiResponse::ok(members))
}

async fn add_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<Created<GroupMember>> {
    let member = state.db.add_member_by_email(group_id, user.id, request).await?;
    log_group_event(group_id, "member_added", Some(user.id), Some(member.role.as_str()));
    Ok(Created(ApiResponse::ok(member)))
}

async fn update_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateMemberRequest>,
) -> Result<ApiResponse<GroupMember>> {
    let member = state.db.update_member(group_id, user.id, member_id, request).await?;
    log_group_event(group_id, "member_updated", Some(user.id), Some(member.role.as_str()));
    Ok(ApiResponse::ok(member))
}

async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<ApiResponse<()>> {
    state.db.remove_member(group_id, user.id, member_id).await?;
    log_group_event(group_id, "member_removed", Some(user.id), None);
    Ok(ApiResponse::with_message((), "Member removed"))
}

async fn join_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
) -> Result<Created<GroupMember>> {
    let member = state.db.join_group(group_id, user.id).await?;
    log_group_event(group_id, "joined", Some(user.id), None);
    Ok(Created(ApiResponse::with_message(member, "Joined group")))
}

async fn leave_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<()>> {
    state.db.leave_group(group_id, user.id).await?;
    log_group_event(group_id, "left", Some(user.id), None);
    Ok(ApiResponse::with_message((), "Left group"))
}
