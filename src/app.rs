//! Application state and HTTP router

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::Settings;
use crate::database::{DatabasePool, DatabaseService};
use crate::handlers;
use crate::middleware::{rate_limit_middleware, request_logging_middleware, IpRateLimiter};
use crate::services::ServiceFactory;
use crate::utils::errors::Result;

pub const API_PREFIX: &str = "/api/v1";

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseService,
    pub services: ServiceFactory,
    pub rate_limiter: Arc<IpRateLimiter>,
}

impl AppState {
    pub fn new(settings: Settings, pool: DatabasePool) -> Result<Self> {
        let db = DatabaseService::new(pool);
        let services = ServiceFactory::new(&settings, db.clone())?;
        let rate_limiter = Arc::new(IpRateLimiter::new(&settings.security)?);

        Ok(Self {
            settings: Arc::new(settings),
            db,
            services,
            rate_limiter,
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, HeaderName::from_static("x-request-id")]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Build the full API router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::health::routes())
        .merge(handlers::auth::routes())
        .merge(handlers::dashboard::routes())
        .merge(handlers::groups::routes())
        .merge(handlers::events::routes())
        .merge(handlers::contributions::routes())
        .merge(handlers::payments::routes())
        .merge(handlers::media::routes(state.settings.upload.max_file_size))
        .merge(handlers::webhooks::routes());

    Router::new()
        .nest(API_PREFIX, api)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn(request_logging_middleware))
        .layer(cors_layer(&state.settings.server.cors_origins))
        .with_state(state)
}
