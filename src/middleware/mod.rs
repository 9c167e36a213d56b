//! Middleware module
//!
//! This module contains middleware for request processing

pub mod auth;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used middleware
pub use auth::AuthUser;
pub use logging::request_logging_middleware;
pub use rate_limit::{rate_limit_middleware, IpRateLimiter};
