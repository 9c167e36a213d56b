//! Registration, login and token rotation

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

use crate::app::AppState;
use crate::handlers::extract::Json;
use crate::middleware::AuthUser;
use crate::models::{ApiResponse, AuthResponse, Created, LoginRequest, RefreshRequest, RegisterRequest, User};
use crate::utils::errors::Result;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Created<AuthResponse>> {
    let response = state.services.auth_service.register(request).await?;
    Ok(Created(ApiResponse::with_message(response, "Registration successful")))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let response = state.services.auth_service.login(request).await?;
    Ok(ApiResponse::ok(response))
}

async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let response = state.services.auth_service.refresh(&request.refresh_token).await?;
    Ok(ApiResponse::ok(response))
}

async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<RefreshRequest>,
) -> Result<ApiResponse<()>> {
    state
        .services
        .auth_service
        .logout(user.id, &request.refresh_token)
        .await?;
    Ok(ApiResponse::with_message((), "Logged out"))
}

async fn me(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<User>> {
    let profile = state.services.auth_service.me(user.id).await?;
    Ok(ApiResponse::ok(profile))
}
