//! Group events and RSVPs

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::extract::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::utils::errors::{Result, RivayaError};
use crate::utils::logging::log_group_event;

use super::page_params;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups/:id/events", post(create_event).get(list_events))
        .route("/events/:id", get(get_event).patch(update_event))
        .route("/events/:id/cancel", post(cancel_event))
        .route("/events/:id/rsvp", put(rsvp))
        .route("/events/:id/rsvps", get(list_rsvps))
}

async fn load_event(state: &AppState, event_id: Uuid) -> Result<Event> {
    state
        .db
        .events
        .find_by_id(event_id)
        .await?
        .ok_or_else(|| RivayaError::not_found("Event", event_id))
}

/// Members see every event of their group; others only public ones
async fn load_visible_event(state: &AppState, event_id: Uuid, viewer: Uuid) -> Result<Event> {
    let event = load_event(state, event_id).await?;
    if event.is_public {
        return Ok(event);
    }

    match state.db.groups.find_member(event.group_id, viewer).await? {
        Some(_) => Ok(event),
        None => Err(RivayaError::not_found("Event", event_id)),
    }
}

async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Created<Event>> {
    request.validate()?;
    let (group, _) = state.db.authorize(group_id, user.id, GroupPermission::ManageEvents).await?;
    if group.status != GroupStatus::Active {
        return Err(RivayaError::Conflict("Events can only be added to active groups".to_string()));
    }

    let event = state.db.events.create(group_id, user.id, request).await?;
    log_group_event(group_id, "event_created", Some(user.id), Some(&event.title));
    Ok(Created(ApiResponse::ok(event)))
}

async fn list_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<EventListQuery>,
) -> Result<ApiResponse<Paginated<Event>>> {
    state.db.require_member(group_id, user.id).await?;

    let params = page_params(query.page, query.limit);
    let (events, total) = state
        .db
        .events
        .list_for_group(group_id, query.status, query.upcoming, params.limit() as i64, params.offset())
        .await?;
    Ok(ApiResponse::ok(Paginated::new(events, &params, total)))
}

async fn get_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<Event>> {
    let event = load_visible_event(&state, event_id, user.id).await?;
    Ok(ApiResponse::ok(event))
}

async fn update_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<ApiResponse<Event>> {
    let event = load_event(&state, event_id).await?;
    state.db.authorize(event.group_id, user.id, GroupPermission::ManageEvents).await?;
    request.validate(&event)?;

    let updated = state.db.events.update(event_id, request).await?;
    Ok(ApiResponse::ok(updated))
}

async fn cancel_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<Event>> {
    let event = load_event(&state, event_id).await?;
    state.db.authorize(event.group_id, user.id, GroupPermission::ManageEvents).await?;
    if event.status == EventStatus::Completed {
        return Err(RivayaError::InvalidStateTransition {
            from: "completed".to_string(),
            to: "cancelled".to_string(),
        });
    }

    let request = UpdateEventRequest {
        status: Some(EventStatus::Cancelled),
        ..UpdateEventRequest::default()
    };
    request.validate(&event)?;

    let cancelled = state.db.events.update(event_id, request).await?;
    log_group_event(event.group_id, "event_cancelled", Some(user.id), Some(&event.title));
    Ok(ApiResponse::with_message(cancelled, "Event cancelled"))
}

async fn rsvp(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(request): Json<RsvpRequest>,
) -> Result<ApiResponse<EventRsvp>> {
    request.validate()?;
    load_visible_event(&state, event_id, user.id).await?;

    let rsvp = state.db.events.upsert_rsvp(event_id, user.id, request).await?;
    Ok(ApiResponse::ok(rsvp))
}

async fn list_rsvps(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<RsvpList>> {
    let event = load_event(&state, event_id).await?;
    state.db.require_member(event.group_id, user.id).await?;

    let rsvps = state.db.events.list_rsvps(event_id).await?;
    let summary = RsvpSummary::from_rsvps(&rsvps);
    Ok(ApiResponse::ok(RsvpList { rsvps, summary }))
}
