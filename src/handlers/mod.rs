//! HTTP handlers
//!
//! One module per API area; each exposes the routes it serves.

pub mod auth;
pub mod contributions;
pub mod dashboard;
pub mod events;
pub mod extract;
pub mod groups;
pub mod health;
pub mod media;
pub mod payments;
pub mod webhooks;

use crate::models::PaginationParams;

/// Pagination parameters embedded in a list query
pub(crate) fn page_params(page: Option<u32>, limit: Option<u32>) -> PaginationParams {
    PaginationParams { page, limit }
}
