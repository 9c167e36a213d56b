//! Rate limiting middleware
//!
//! Per-client request throttling backed by a `governor` keyed limiter.
//! Clients are keyed by the first `X-Forwarded-For` entry, falling back to
//! the peer address.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::app::AppState;
use crate::config::settings::SecurityConfig;
use crate::utils::errors::{Result, RivayaError};

const FORWARDED_FOR: &str = "x-forwarded-for";
const API_PREFIX: &str = "/api/v1";

/// Keyed limiter admitting `rate_limit_max` requests per window per client
pub struct IpRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl IpRateLimiter {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let max = NonZeroU32::new(config.rate_limit_max)
            .ok_or_else(|| RivayaError::Config("rate_limit_max must be greater than 0".to_string()))?;
        let window = Duration::from_secs(config.rate_limit_window_secs);
        let quota = Quota::with_period(window / max.get())
            .ok_or_else(|| RivayaError::Config("rate_limit_window_secs must be greater than 0".to_string()))?
            .allow_burst(max);

        Ok(Self {
            limiter: RateLimiter::keyed(quota),
        })
    }

    /// Count one request against `key`
    pub fn check(&self, key: &str) -> Result<()> {
        self.limiter
            .check_key(&key.to_string())
            .map_err(|_| RivayaError::RateLimitExceeded)
    }

    /// Drop state for clients that are back to a full quota
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        debug!(tracked_clients = self.limiter.len(), "Pruned rate limit state");
    }
}

/// Key identifying the client behind a request
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Health probes and gateway callbacks are never throttled
pub fn is_exempt(path: &str) -> bool {
    let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
    path.starts_with("/health") || path.starts_with("/webhooks/")
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);

    if let Err(e) = state.rate_limiter.check(&key) {
        warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return e.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter(max: u32) -> IpRateLimiter {
        IpRateLimiter::new(&SecurityConfig {
            rate_limit_window_secs: 60,
            rate_limit_max: max,
        })
        .unwrap()
    }

    #[test]
    fn test_admits_max_then_rejects() {
        let limiter = limiter(3);
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(matches!(limiter.check("10.0.0.1"), Err(RivayaError::RateLimitExceeded)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_err());
        assert!(limiter.check("10.0.0.2").is_ok());
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let result = IpRateLimiter::new(&SecurityConfig {
            rate_limit_window_secs: 60,
            rate_limit_max: 0,
        });
        assert!(matches!(result, Err(RivayaError::Config(_))));
    }

    #[test]
    fn test_client_key() {
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer)), "192.168.1.5");
        assert_eq!(client_key(&HeaderMap::new(), None), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/api/v1/health"));
        assert!(is_exempt("/api/v1/health/db"));
        assert!(is_exempt("/api/v1/webhooks/stripe"));
        assert!(!is_exempt("/api/v1/groups"));
        assert!(!is_exempt("/api/v1/auth/login"));
    }
}
