//! Authentication service implementation
//!
//! Password hashing with argon2id, HS256 access tokens and opaque refresh
//! tokens kept in Redis.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::database::UserRepository;
use crate::models::user::{
    AuthResponse, CreateUserRequest, LoginRequest, RegisterRequest, User, UserRole, UserStatus,
};
use crate::services::redis::RedisService;
use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;
use crate::utils::logging::log_user_action;

pub const ACCESS_TOKEN_TYPE: &str = "access";
const REFRESH_TOKEN_BYTES: usize = 32;
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hash a password into an argon2id PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| RivayaError::PasswordHash(e.to_string()))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| RivayaError::PasswordHash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| RivayaError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub typ: String,
}

/// Issues and verifies signed access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_seconds: u64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl_seconds: config.access_ttl_seconds,
        }
    }

    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl_seconds
    }

    /// Sign an access token for a user
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.access_ttl_seconds as i64,
            typ: ACCESS_TOKEN_TYPE.to_string(),
        };

        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Verify signature, expiry and token type
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        if data.claims.typ != ACCESS_TOKEN_TYPE {
            return Err(RivayaError::Authentication("Not an access token".to_string()));
        }

        Ok(data.claims)
    }
}

/// Authentication service for registration, login and token rotation
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    redis: RedisService,
    tokens: TokenService,
    refresh_ttl_seconds: u64,
    registration_enabled: bool,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        redis: RedisService,
        jwt: &JwtConfig,
        registration_enabled: bool,
    ) -> Self {
        Self {
            users,
            redis,
            tokens: TokenService::new(jwt),
            refresh_ttl_seconds: jwt.refresh_ttl_seconds,
            registration_enabled,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new account and sign it in
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        if !self.registration_enabled {
            return Err(RivayaError::FeatureDisabled("Registration is disabled".to_string()));
        }
        request.validate()?;

        let email = helpers::normalize_email(&request.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(RivayaError::Conflict("Email is already registered".to_string()));
        }

        let user = self
            .users
            .create(CreateUserRequest {
                email,
                full_name: request.full_name.trim().to_string(),
                password_hash: hash_password(&request.password)?,
                role: UserRole::User,
            })
            .await
            .map_err(|e| match e {
                RivayaError::Database(ref db) if crate::utils::errors::is_unique_violation(db) => {
                    RivayaError::Conflict("Email is already registered".to_string())
                }
                other => other,
            })?;

        log_user_action(user.id, "register", None);
        self.issue_tokens(user).await
    }

    /// Exchange credentials for tokens
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let email = helpers::normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| RivayaError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(RivayaError::Authentication(INVALID_CREDENTIALS.to_string()));
        }
        ensure_active(&user)?;

        log_user_action(user.id, "login", None);
        self.issue_tokens(user).await
    }

    /// Rotate a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        let user_id = self
            .redis
            .take_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| RivayaError::Authentication("Invalid refresh token".to_string()))?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| RivayaError::Authentication("Invalid refresh token".to_string()))?;
        ensure_active(&user)?;

        self.issue_tokens(user).await
    }

    /// Revoke a refresh token
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> Result<()> {
        let revoked = self.redis.revoke_refresh_token(refresh_token).await?;
        log_user_action(user_id, "logout", None);
        info!(user_id = %user_id, revoked = revoked, "User logged out");
        Ok(())
    }

    /// Current user profile
    pub async fn me(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| RivayaError::not_found("User", user_id))
    }

    async fn issue_tokens(&self, user: User) -> Result<AuthResponse> {
        let access_token = self.tokens.issue(&user)?;
        let refresh_token = helpers::generate_token(REFRESH_TOKEN_BYTES);
        self.redis
            .store_refresh_token(&refresh_token, user.id, self.refresh_ttl_seconds)
            .await?;

        Ok(AuthResponse {
            user,
            access_token,
            refresh_token,
            expires_in: self.tokens.access_ttl_seconds(),
            token_type: "Bearer".to_string(),
        })
    }
}

fn ensure_active(user: &User) -> Result<()> {
    match user.status {
        UserStatus::Suspended => Err(RivayaError::PermissionDenied("Account is suspended".to_string())),
        UserStatus::Inactive => Err(RivayaError::PermissionDenied("Account is inactive".to_string())),
        UserStatus::Active | UserStatus::Pending => Ok(()),
    }
}
