//! HTTP-level tests.
//!
//! The router tests drive the axum app in-process and never touch the
//! database. The `live_*` tests expect a running server with a verified
//! librarian account; run them with `cargo test -- --ignored`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use puthipallab_server::{
    api,
    config::AppConfig,
    error::AppResult,
    repository::Repository,
    services::{
        email::{Mailer, OutgoingEmail},
        Services,
    },
    AppState,
};

const BASE_URL: &str = "http://localhost:3000/api/v1";

struct NullMailer;

#[async_trait::async_trait]
impl Mailer for NullMailer {
    async fn send(&self, _email: OutgoingEmail) -> AppResult<()> {
        Ok(())
    }
}

fn app() -> Router {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("lazy pool");
    let services = Services::new(Repository::new(pool.clone()), &config, Arc::new(NullMailer));

    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    })
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app()
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_protected_route_requires_session() {
    let response = app()
        .oneshot(Request::get("/api/v1/users/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_cookie_is_rejected() {
    let response = app()
        .oneshot(
            Request::get("/api/v1/issues")
                .header(header::COOKIE, "jwt=not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let response = app()
        .oneshot(Request::get("/api/v1/users/logout").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("jwt="));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = app()
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/issues/return"].is_object());
}

/// Log in against a running server and return the session token
async fn get_auth_token(client: &Client) -> String {
    let email = std::env::var("PUTHI_TEST_EMAIL").unwrap_or_else(|_| "librarian@puthipallab.org".into());
    let password = std::env::var("PUTHI_TEST_PASSWORD").unwrap_or_else(|_| "librarian123".into());

    let response = client
        .post(format!("{}/users/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
#[ignore]
async fn live_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/users/login", BASE_URL))
        .json(&json!({ "email": "nobody@example.com", "password": "wrong-password" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn live_list_books_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books?available=true&sort=-borrow_count", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());
}

#[tokio::test]
#[ignore]
async fn live_librarian_overview() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/overview", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["total_books"].is_number());
}
