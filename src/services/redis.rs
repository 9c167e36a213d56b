//! Redis integration service implementation
//!
//! Holds refresh tokens and provides small prefixed key/value helpers.

use redis::{Client, AsyncCommands, RedisResult};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RedisConfig;
use crate::utils::errors::{RivayaError, Result};

/// Redis service for the refresh token store
#[derive(Clone)]
#[derive(Debug)]
pub struct RedisService {
    client: Client,
    config: RedisConfig,
}

impl RedisService {
    /// Create a new RedisService instance; no connection is made until first use
    pub fn new(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self { client, config })
    }

    /// Get Redis connection
    async fn get_connection(&self) -> Result<redis::aio::Connection> {
        Ok(self.client.get_async_connection().await?)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    /// Set a value in Redis with TTL
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let mut conn = self.get_connection().await?;
        let serialized = serde_json::to_string(value)?;

        let full_key = self.full_key(key);
        let ttl = ttl_seconds.unwrap_or(self.config.ttl_seconds);

        let _: () = conn.set_ex(&full_key, serialized, ttl).await?;

        debug!(key = %full_key, ttl = ttl, "Value set in Redis");
        Ok(())
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let deleted: i32 = conn.del(&full_key).await?;

        debug!(key = %full_key, deleted = deleted > 0, "Key deletion attempted");
        Ok(deleted > 0)
    }

    /// Read and delete a key in one atomic step
    pub async fn take<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let (value, _deleted): (Option<String>, i32) = redis::pipe()
            .atomic()
            .get(&full_key)
            .del(&full_key)
            .query_async(&mut conn)
            .await?;

        value
            .map(|data| serde_json::from_str::<T>(&data).map_err(RivayaError::from))
            .transpose()
    }

    /// Store a refresh token for a user
    pub async fn store_refresh_token(&self, token: &str, user_id: Uuid, ttl_seconds: u64) -> Result<()> {
        self.set(&refresh_key(token), &user_id, Some(ttl_seconds)).await
    }

    /// Consume a refresh token, returning the user it belonged to
    pub async fn take_refresh_token(&self, token: &str) -> Result<Option<Uuid>> {
        self.take(&refresh_key(token)).await
    }

    pub async fn revoke_refresh_token(&self, token: &str) -> Result<bool> {
        self.delete(&refresh_key(token)).await
    }

    /// Health check for Redis connection
    pub async fn health_check(&self) -> Result<bool> {
        match self.get_connection().await {
            Ok(mut conn) => {
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(response) => {
                        debug!(response = %response, "Redis health check successful");
                        Ok(response == "PONG")
                    }
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                Ok(false)
            }
        }
    }
}

fn refresh_key(token: &str) -> String {
    format!("refresh:{}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RedisConfig {
        RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: "rivaya:test:".to_string(),
            ttl_seconds: 60,
        }
    }

    #[test]
    fn test_keys_are_prefixed() {
        let service = RedisService::new(config()).unwrap();
        assert_eq!(service.full_key(&refresh_key("abc")), "rivaya:test:refresh:abc");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = RedisService::new(RedisConfig {
            url: "not a url".to_string(),
            ..config()
        });
        assert!(matches!(result, Err(RivayaError::Redis(_))));
    }
}
