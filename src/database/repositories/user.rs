//! User repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;

use crate::models::user::{User, CreateUserRequest};
use crate::utils::errors::RivayaError;

#[derive(Clone)]
#[derive(Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, RivayaError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, password_hash, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'active', $6, $6)
            RETURNING id, email, full_name, password_hash, role, status, phone, stripe_customer_id, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request.email)
        .bind(request.full_name)
        .bind(request.password_hash)
        .bind(request.role)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RivayaError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, password_hash, role, status, phone, stripe_customer_id, created_at, updated_at FROM users WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by normalized email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RivayaError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, password_hash, role, status, phone, stripe_customer_id, created_at, updated_at FROM users WHERE email = $1"
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Remember the Stripe customer created for a user
    pub async fn set_stripe_customer_id(&self, id: Uuid, customer_id: &str) -> Result<(), RivayaError> {
        sqlx::query("UPDATE users SET stripe_customer_id = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(customer_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, RivayaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
