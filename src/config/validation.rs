//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{RivayaError, Result};
use super::Settings;

/// Minimum accepted length of the JWT signing secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_server_config(&settings.server)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_jwt_config(&settings.jwt)?;
    validate_security_config(&settings.security)?;
    validate_upload_config(&settings.upload)?;

    if settings.contributions.overdue_sweep_interval_secs == 0 {
        return Err(RivayaError::Config(
            "Overdue sweep interval must be greater than 0".to_string(),
        ));
    }

    validate_logging_config(&settings.logging)?;

    Ok(())
}

fn validate_server_config(config: &super::ServerConfig) -> Result<()> {
    if config.host.is_empty() {
        return Err(RivayaError::Config("Server host is required".to_string()));
    }

    if config.port == 0 {
        return Err(RivayaError::Config("Server port must be greater than 0".to_string()));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(RivayaError::Config("Database URL is required".to_string()));
    }

    url::Url::parse(&config.url)
        .map_err(|e| RivayaError::Config(format!("Database URL is invalid: {}", e)))?;

    if config.max_connections == 0 {
        return Err(RivayaError::Config(
            "Max connections must be greater than 0".to_string(),
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(RivayaError::Config(
            "Min connections cannot be greater than max connections".to_string(),
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(RivayaError::Config("Redis URL is required".to_string()));
    }

    Ok(())
}

fn validate_jwt_config(config: &super::JwtConfig) -> Result<()> {
    if config.secret.len() < MIN_JWT_SECRET_LEN {
        return Err(RivayaError::Config(format!(
            "JWT secret must be at least {} characters",
            MIN_JWT_SECRET_LEN
        )));
    }

    if config.access_ttl_seconds == 0 || config.refresh_ttl_seconds == 0 {
        return Err(RivayaError::Config(
            "Token lifetimes must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_security_config(config: &super::SecurityConfig) -> Result<()> {
    if config.rate_limit_window_secs == 0 || config.rate_limit_max == 0 {
        return Err(RivayaError::Config(
            "Rate limit window and max must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_upload_config(config: &super::UploadConfig) -> Result<()> {
    if config.max_file_size == 0 {
        return Err(RivayaError::Config(
            "Max file size must be greater than 0".to_string(),
        ));
    }

    if config.path.is_empty() {
        return Err(RivayaError::Config("Upload path is required".to_string()));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(RivayaError::Config(format!(
            "Invalid log level: {}. Valid levels: {:?}",
            config.level, valid_levels
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.jwt.secret = "x".repeat(MIN_JWT_SECRET_LEN);
        settings
    }

    #[test]
    fn test_default_settings_with_secret_are_valid() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut settings = valid_settings();
        settings.jwt.secret = "too-short".to_string();
        assert_matches!(validate_settings(&settings), Err(RivayaError::Config(_)));
    }

    #[test]
    fn test_database_url_must_parse() {
        let mut settings = valid_settings();
        settings.database.url = "not a url".to_string();
        assert!(validate_settings(&settings).is_err());

        settings.database.url = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_pool_bounds() {
        let mut settings = valid_settings();
        settings.database.max_connections = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = valid_settings();
        settings.database.min_connections = 20;
        settings.database.max_connections = 5;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rate_limit_and_upload_limits() {
        let mut settings = valid_settings();
        settings.security.rate_limit_max = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = valid_settings();
        settings.upload.max_file_size = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut settings = valid_settings();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_empty_redis_url_rejected() {
        let mut settings = valid_settings();
        settings.redis.url = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let mut settings = valid_settings();
        settings.contributions.overdue_sweep_interval_secs = 0;
        assert!(validate_settings(&settings).is_err());
    }
}
