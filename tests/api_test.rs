//! Router-level tests that need neither Postgres nor Redis

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::json;
use serial_test::serial;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use rivaya_api::config::JwtConfig;
use rivaya_api::models::UserRole;
use rivaya_api::services::auth::{Claims, TokenService};
use rivaya_api::services::stripe;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app(test_settings())
        .oneshot(get("/api/v1/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], rivaya_api::VERSION);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = test_app(test_settings())
        .oneshot(get("/api/v1/nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app(test_settings());

    for uri in ["/api/v1/auth/me", "/api/v1/me/dashboard", "/api/v1/groups"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_garbage_and_refresh_typed_tokens_rejected() {
    let app = test_app(test_settings());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header("authorization", "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let tokens = TokenService::new(&JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_ttl_seconds: 3600,
        refresh_ttl_seconds: 3600,
    });
    let now = Utc::now().timestamp();
    let token = tokens
        .sign(&Claims {
            sub: Uuid::new_v4(),
            email: "member@rivaya.com".to_string(),
            role: UserRole::User,
            iat: now,
            exp: now + 3600,
            typ: "refresh".to_string(),
        })
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_json_body_uses_error_envelope() {
    let response = test_app(test_settings())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_stripe_webhook_rejects_bad_signature() {
    let app = test_app(test_settings());
    let payload = json!({"id": "evt_1", "type": "payment_intent.succeeded"}).to_string();

    let forged = stripe::sign_payload(payload.as_bytes(), "whsec_wrong", Utc::now().timestamp()).unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/stripe")
                .header("stripe-signature", forged)
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_SIGNATURE");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/stripe")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_webhook_rejects_signed_garbage() {
    let payload = b"this is not json";
    let header = stripe::sign_payload(payload, TEST_STRIPE_WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();

    let response = test_app(test_settings())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/stripe")
                .header("stripe-signature", header)
                .body(Body::from(payload.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stripe_webhook_unconfigured() {
    let mut settings = test_settings();
    settings.payments.stripe_webhook_secret = None;

    let response = test_app(settings)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/stripe")
                .header("stripe-signature", "t=1,v1=00")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_mpesa_callback_requires_token() {
    let app = test_app(test_settings());
    let callback = json!({
        "Body": {"stkCallback": {"CheckoutRequestID": "ws_CO_1", "ResultCode": 0}}
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/webhooks/mpesa", callback.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request("POST", "/api/v1/webhooks/mpesa?token=wrong", callback))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_mpesa_callback_rejects_malformed_body() {
    let uri = format!("/api/v1/webhooks/mpesa?token={}", TEST_MPESA_TOKEN);
    let response = test_app(test_settings())
        .oneshot(json_request("POST", &uri, json!({"Body": {}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_relay_disabled_without_secret() {
    let response = test_app(test_settings())
        .oneshot(json_request(
            "POST",
            "/api/v1/webhooks/payments",
            json!({"gateway": "stripe", "event": "payment_intent.succeeded", "data": {"id": "pi_1"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_relay_checks_secret_and_gateway() {
    let mut settings = test_settings();
    settings.payments.relay_secret = Some(TEST_RELAY_SECRET.to_string());
    let app = test_app(settings);

    let mut request = json_request(
        "POST",
        "/api/v1/webhooks/payments",
        json!({"gateway": "stripe", "event": "payment_intent.succeeded", "data": {"id": "pi_1"}}),
    );
    request.headers_mut().insert("x-webhook-secret", "wrong".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = json_request(
        "POST",
        "/api/v1/webhooks/payments",
        json!({"gateway": "bitcoin", "event": "paid", "data": {"id": "tx_1"}}),
    );
    request.headers_mut().insert("x-webhook-secret", TEST_RELAY_SECRET.parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_paypal_webhook_unconfigured() {
    let response = test_app(test_settings())
        .oneshot(json_request(
            "POST",
            "/api/v1/webhooks/paypal",
            json!({"id": "WH-1", "event_type": "PAYMENT.CAPTURE.COMPLETED"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_paypal_webhook_forwards_delivered_body() {
    let delivered = r#"{"id":"WH-1","create_time":"2024-06-01T10:00:00Z","resource_type":"capture","event_type":"PAYMENT.CAPTURE.COMPLETED","summary":"ok","resource":{"id":"CAP-1"}}"#;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "A21AAF"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/notifications/verify-webhook-signature"))
        .and(body_string_contains(format!("\"webhook_event\":{}", delivered)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "verification_status": "FAILURE"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.payments.paypal_client_id = Some("client-id".to_string());
    settings.payments.paypal_client_secret = Some("client-secret".to_string());
    settings.payments.paypal_webhook_id = Some("WH-CONFIG-1".to_string());
    settings.payments.paypal_api_base = server.uri();

    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/paypal")
        .header("content-type", "application/json");
    for (name, value) in [
        ("paypal-auth-algo", "SHA256withRSA"),
        ("paypal-cert-url", "https://api.paypal.com/v1/notifications/certs/CERT-1"),
        ("paypal-transmission-id", "tx-1"),
        ("paypal-transmission-sig", "signature"),
        ("paypal-transmission-time", "2024-06-01T10:00:00Z"),
    ] {
        request = request.header(name, value);
    }

    let response = test_app(settings)
        .oneshot(request.body(Body::from(delivered)).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
#[serial]
async fn test_rate_limit_per_client() {
    let mut settings = test_settings();
    settings.security.rate_limit_max = 2;
    let app = test_app(settings);

    let from = |ip: &str| {
        Request::builder()
            .uri("/api/v1/auth/me")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.clone().oneshot(from("198.51.100.1")).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.clone().oneshot(from("198.51.100.1")).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let limited = app.clone().oneshot(from("198.51.100.1")).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(limited).await["error"]["code"], "RATE_LIMITED");

    assert_eq!(app.clone().oneshot(from("198.51.100.2")).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-forwarded-for", "198.51.100.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
