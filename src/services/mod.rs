//! Services module
//!
//! This module contains business logic services

pub mod auth;
pub mod media;
pub mod mpesa;
pub mod payment;
pub mod paypal;
pub mod redis;
pub mod stripe;
pub mod webhook;

// Re-export commonly used services
pub use auth::{AuthService, Claims, TokenService};
pub use media::{MediaService, MediaStorage};
pub use payment::PaymentService;
pub use paypal::PaypalClient;
pub use redis::RedisService;
pub use stripe::StripeClient;
pub use webhook::{EventAction, GatewayEvent, WebhookOutcome, WebhookService};

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub auth_service: AuthService,
    pub redis_service: RedisService,
    pub payment_service: PaymentService,
    pub webhook_service: WebhookService,
    pub media_service: MediaService,
    pub stripe_client: StripeClient,
    pub paypal_client: PaypalClient,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    ///
    /// Nothing here opens a network connection.
    pub fn new(settings: &Settings, db: DatabaseService) -> Result<Self> {
        let redis_service = RedisService::new(settings.redis.clone())?;
        let stripe_client = StripeClient::new(&settings.payments)?;
        let paypal_client = PaypalClient::new(&settings.payments)?;

        let auth_service = AuthService::new(
            db.users.clone(),
            redis_service.clone(),
            &settings.jwt,
            settings.features.enable_registration,
        );
        let payment_service = PaymentService::new(db.clone(), stripe_client.clone());
        let webhook_service = WebhookService::new(db.payments.clone());
        let media_service = MediaService::new(
            db,
            settings.upload.clone(),
            settings.features.enable_file_uploads,
        );

        Ok(Self {
            auth_service,
            redis_service,
            payment_service,
            webhook_service,
            media_service,
            stripe_client,
            paypal_client,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let redis_healthy = self.redis_service.health_check().await.unwrap_or(false);

        ServiceHealthStatus {
            redis_healthy,
            stripe_enabled: self.stripe_client.is_enabled(),
            paypal_enabled: self.paypal_client.is_enabled(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthStatus {
    pub redis_healthy: bool,
    pub stripe_enabled: bool,
    pub paypal_enabled: bool,
}

impl ServiceHealthStatus {
    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }

        issues
    }
}
