//! Authentication middleware
//!
//! This module provides the bearer-token extractor protecting API routes.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::{debug, Span};
use uuid::Uuid;

use crate::app::AppState;
use crate::models::UserRole;
use crate::utils::errors::{Result, RivayaError};

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| RivayaError::Authentication("Missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| RivayaError::Authentication("Malformed authorization header".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| RivayaError::Authentication("Malformed authorization header".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(RivayaError::Authentication("Missing bearer token".to_string()));
    }

    Ok(token.trim())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RivayaError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.services.auth_service.tokens().verify(token)?;

        Span::current().record("user_id", tracing::field::display(claims.sub));
        debug!(user_id = %claims.sub, "Request authenticated");

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers("bearer  token ")).unwrap(), "token");
        assert_matches!(bearer_token(&HeaderMap::new()), Err(RivayaError::Authentication(_)));
        assert_matches!(bearer_token(&headers("Basic dXNlcjpwYXNz")), Err(RivayaError::Authentication(_)));
        assert_matches!(bearer_token(&headers("Bearer")), Err(RivayaError::Authentication(_)));
    }
}
