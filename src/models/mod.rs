//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod api;
pub mod user;
pub mod group;
pub mod event;
pub mod contribution;
pub mod payment;
pub mod media;

// Re-export commonly used models
pub use api::{ApiResponse, Created, Paginated, PaginationInfo, PaginationParams};
pub use user::{User, UserRole, UserStatus, CreateUserRequest, RegisterRequest, LoginRequest, RefreshRequest, AuthResponse};
pub use group::{Group, GroupMember, GroupRole, GroupPermission, GroupStatus, GroupType, MemberProfile, CreateGroupRequest, UpdateGroupRequest, AddMemberRequest, UpdateMemberRequest, GroupDetails, GroupSearchQuery};
pub use event::{Event, EventRsvp, EventStatus, EventType, RsvpStatus, CreateEventRequest, UpdateEventRequest, RsvpRequest, EventListQuery, RsvpSummary, RsvpList};
pub use contribution::{Contribution, ContributionTier, ContributionStatus, ContributionFrequency, CreateTierRequest, CreateContributionRequest, ContributionListQuery, WaiveRequest};
pub use payment::{Payment, PaymentWebhook, PaymentStatus, PaymentGateway, CreatePaymentRequest, PaymentInitiation, RefundRequest, PaymentListQuery, PaymentSummary, PaymentSummaryQuery};
pub use media::{MediaAsset, MediaType, CreateMediaRequest};
