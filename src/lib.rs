//! RIVAYA API
//!
//! REST backend for multi-tenant group management: groups and their
//! members, events and RSVPs, contribution tracking, payments reconciled
//! from gateway webhooks, and media uploads.

pub mod app;
pub mod config;
pub mod database;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::{build_router, AppState};
pub use config::Settings;
pub use utils::errors::{Result, RivayaError};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
