//! Request extractors whose rejections render as API errors
//!
//! Drop-in replacements for axum's `Json`, `Query`, `Path` and `Multipart`;
//! a malformed body, query string or path segment produces the usual
//! `{success:false,error:{..}}` envelope instead of axum's plain text.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};

use crate::utils::errors::RivayaError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(RivayaError))]
pub struct Json<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(RivayaError))]
pub struct Query<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RivayaError))]
pub struct Path<T>(pub T);

pub struct Multipart(pub axum::extract::Multipart);

#[async_trait]
impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = RivayaError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::extract::Multipart::from_request(request, state)
            .await
            .map(Multipart)
            .map_err(RivayaError::from)
    }
}

impl From<JsonRejection> for RivayaError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                RivayaError::Validation("Expected a JSON body with content-type application/json".to_string())
            }
            other => RivayaError::Validation(format!("Invalid JSON body: {}", other.body_text())),
        }
    }
}

impl From<QueryRejection> for RivayaError {
    fn from(rejection: QueryRejection) -> Self {
        RivayaError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for RivayaError {
    fn from(rejection: PathRejection) -> Self {
        RivayaError::Validation(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for RivayaError {
    fn from(rejection: MultipartRejection) -> Self {
        RivayaError::Validation(format!("Invalid multipart body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        #[allow(dead_code)]
        email: String,
    }

    async fn body_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_envelope() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let rejection = Json::<Login>::from_request(request, &()).await.unwrap_err();
        assert!(matches!(rejection, RivayaError::Validation(_)));

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_content_type_rejected() {
        let request = Request::builder()
            .method("POST")
            .body(Body::from(r#"{"email":"a@b.co"}"#))
            .unwrap();
        let rejection = Json::<Login>::from_request(request, &()).await.unwrap_err();
        assert!(matches!(rejection, RivayaError::Validation(ref m) if m.contains("content-type")));
    }

    #[tokio::test]
    async fn test_bad_query_rejected() {
        #[derive(Debug, Deserialize)]
        struct Page {
            #[allow(dead_code)]
            page: u32,
        }

        let request = Request::builder().uri("/groups?page=first").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let rejection = Query::<Page>::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(rejection, RivayaError::Validation(_)));
    }
}
