//! Group media uploads

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::Router;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::extract::{Multipart, Path, Query};
use crate::middleware::AuthUser;
use crate::models::{ApiResponse, Created, MediaAsset, Paginated, PaginationParams};
use crate::utils::errors::{Result, RivayaError};

const FILE_FIELD: &str = "file";
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Routes for media; uploads may carry up to `max_file_size` bytes
pub fn routes(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/groups/:id/media",
            post(upload_media)
                .layer(DefaultBodyLimit::max(body_limit))
                .get(list_media),
        )
        .route("/media/:id", delete(delete_media))
}

fn multipart_error(error: MultipartError) -> RivayaError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RivayaError::PayloadTooLarge("Upload exceeds the maximum file size".to_string())
    } else {
        RivayaError::Validation(format!("Invalid multipart body: {}", error.body_text()))
    }
}

async fn upload_media(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Multipart(mut multipart): Multipart,
) -> Result<Created<MediaAsset>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let asset = state
            .services
            .media_service
            .upload(group_id, user.id, &filename, &mime_type, &bytes)
            .await?;
        return Ok(Created(ApiResponse::ok(asset)));
    }

    Err(RivayaError::Validation(format!("Missing multipart field '{}'", FILE_FIELD)))
}

async fn list_media(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Paginated<MediaAsset>>> {
    let assets = state.services.media_service.list(group_id, user.id, params).await?;
    Ok(ApiResponse::ok(assets))
}

async fn delete_media(
    State(state): State<AppState>,
    user: AuthUser,
    Path(media_id): Path<Uuid>,
) -> Result<ApiResponse<()>> {
    state.services.media_service.delete(media_id, user.id).await?;
    Ok(ApiResponse::with_message((), "Media deleted"))
}
