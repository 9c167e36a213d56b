//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;
pub mod group;
pub mod event;
pub mod contribution;
pub mod payment;
pub mod media;

// Re-export repositories
pub use user::UserRepository;
pub use group::GroupRepository;
pub use event::EventRepository;
pub use contribution::ContributionRepository;
pub use payment::PaymentRepository;
pub use media::MediaRepository;
