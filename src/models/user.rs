//! User model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;

/// Platform-wide role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub phone: Option<String>,
    #[serde(skip_serializing, default)]
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<()> {
        if !helpers::is_valid_email(&helpers::normalize_email(&self.email)) {
            return Err(RivayaError::Validation("Invalid email address".to_string()));
        }
        helpers::require_length("Full name", &self.full_name, 1, 100)?;
        if self.password.chars().count() < 8 {
            return Err(RivayaError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens issued on login, registration and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, name: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            full_name: name.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(request("demo@rivaya.com", "Demo User", "password1").validate().is_ok());
        assert!(request("demo", "Demo User", "password1").validate().is_err());
        assert!(request("demo@rivaya.com", "", "password1").validate().is_err());
        assert!(request("demo@rivaya.com", "Demo User", "short").validate().is_err());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "demo@rivaya.com".to_string(),
            full_name: "Demo".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::User,
            status: UserStatus::Active,
            phone: None,
            stripe_customer_id: Some("cus_123".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("cus_123"));
        assert!(json.contains("fullName"));
    }
}
