//! Database module
//!
//! This module handles database connections and operations

pub mod connection;
pub mod repositories;
pub mod service;

// Re-export commonly used database components
pub use connection::{DatabasePool, DatabaseHealth, create_pool, create_lazy_pool, run_migrations, health_check, probe};
pub use repositories::{
    UserRepository, GroupRepository, EventRepository, ContributionRepository, PaymentRepository,
    MediaRepository,
};
pub use service::DatabaseService;
