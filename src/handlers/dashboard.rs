use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::app::AppState;
use crate::database::service::UserDashboard;
use crate::middleware::AuthUser;
use crate::models::ApiResponse;
use crate::utils::errors::Result;

pub fn routes() -> Router<AppState> {
    Router::new().route("/me/dashboard", get(dashboard))
}

async fn dashboard(State(state): State<AppState>, user: AuthUser) -> Result<ApiResponse<UserDashboard>> {
    let dashboard = state.db.get_user_dashboard(user.id).await?;
    Ok(ApiResponse::ok(dashboard))
}
