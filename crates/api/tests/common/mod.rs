// All functions in this module are shared test helpers. Not every test binary
// uses every helper, so we suppress dead_code warnings at the item level.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use scenedex_api::auth::{EMAIL_HEADER, EMAIL_VERIFIED_HEADER, USER_ID_HEADER};
use scenedex_api::config::ServerConfig;
use scenedex_api::router::build_app_router;
use scenedex_api::state::AppState;
use scenedex_storage::{ObjectStorage, StorageConfig};

/// External identity used by most tests.
pub const TEST_USER: &str = "ext-test-user";
pub const TEST_EMAIL: &str = "test-user@example.com";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
    }
}

/// Storage configuration pointing at an unroutable endpoint.
///
/// Presigning is purely client-side, so upload-init tests work without a
/// store; tests must not exercise paths that perform real S3 I/O.
pub fn test_storage() -> ObjectStorage {
    ObjectStorage::new(StorageConfig {
        endpoint: "http://127.0.0.1:9".to_string(),
        external_endpoint: "http://127.0.0.1:9".to_string(),
        region: "us-east-1".to_string(),
        access_key: "test".to_string(),
        secret_key: "test".to_string(),
        bucket_uploads: "uploads".to_string(),
        bucket_sidecars: "sidecars".to_string(),
        bucket_tmp: "tmp".to_string(),
    })
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// Delegates to [`build_app_router`] so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        storage: Arc::new(test_storage()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Shared HTTP test helpers
// ---------------------------------------------------------------------------

/// Collect the response body into a `serde_json::Value`.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Send a JSON request authenticated as `external_id`.
pub async fn send_json_as(
    app: Router,
    method: Method,
    uri: &str,
    external_id: &str,
    email: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header(USER_ID_HEADER, external_id)
        .header(EMAIL_HEADER, email)
        .header(EMAIL_VERIFIED_HEADER, "true")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST JSON as the default test user.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    send_json_as(app, Method::POST, uri, TEST_USER, TEST_EMAIL, body).await
}

/// GET as the default test user.
pub async fn get(app: Router, uri: &str) -> axum::response::Response {
    get_as(app, uri, TEST_USER, TEST_EMAIL).await
}

/// GET authenticated as `external_id`.
pub async fn get_as(
    app: Router,
    uri: &str,
    external_id: &str,
    email: &str,
) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(USER_ID_HEADER, external_id)
        .header(EMAIL_HEADER, email)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET with no identity headers at all.
pub async fn get_unauthenticated(app: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST JSON with no identity headers at all.
pub async fn post_json_unauthenticated(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// A valid upload-init request body.
pub fn init_body() -> serde_json::Value {
    serde_json::json!({
        "filename": "clip.mp4",
        "mime_type": "video/mp4",
        "size_bytes": 52_428_800_i64,
        "title": "My clip"
    })
}
