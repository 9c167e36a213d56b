//! API envelope and pagination types

use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Success envelope returned by every JSON endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Wrapper giving a `201 Created` status to an envelope
pub struct Created<T>(pub ApiResponse<T>);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// `page`/`limit` query parameters
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.limit() as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationInfo {
    pub fn new(params: &PaginationParams, total: i64) -> Self {
        let page = params.page();
        let limit = params.limit();
        let total = total.max(0);
        let total_pages = (total + limit as i64 - 1) / limit as i64;

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: (page as i64) < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        Self {
            items,
            pagination: PaginationInfo::new(params, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults_and_clamping() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 20);
        assert_eq!(params.offset(), 0);

        let params = PaginationParams { page: Some(0), limit: Some(500) };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);

        let params = PaginationParams { page: Some(3), limit: Some(10) };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn test_pagination_info() {
        let params = PaginationParams { page: Some(2), limit: Some(10) };
        let info = PaginationInfo::new(&params, 25);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(info.has_prev);

        let info = PaginationInfo::new(&PaginationParams::default(), 0);
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next);
        assert!(!info.has_prev);
    }

    #[test]
    fn test_envelope_serializes_camel_case() {
        let body = serde_json::to_value(ApiResponse::with_message(1, "done")).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], 1);
        assert_eq!(body["message"], "done");
        assert!(body["timestamp"].is_string());

        let info = serde_json::to_value(PaginationInfo::new(&PaginationParams::default(), 5)).unwrap();
        assert_eq!(info["totalPages"], 1);
        assert_eq!(info["hasNext"], false);
    }

    proptest! {
        #[test]
        fn pages_cover_every_item(total in 0i64..10_000, limit in 1u32..=100) {
            let params = PaginationParams { page: Some(1), limit: Some(limit) };
            let info = PaginationInfo::new(&params, total);
            prop_assert!(info.total_pages * limit as i64 >= total);
            prop_assert!((info.total_pages - 1).max(0) * (limit as i64) < total.max(1));
        }
    }
}
