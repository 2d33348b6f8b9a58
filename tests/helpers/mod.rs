//! Shared test helpers for integration tests.
#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use filesync_api::AppState;
use filesync_api::auth::Claims;
use filesync_core::config::AppConfig;

/// Fully in-process configuration: memory store, memory blobs, memory bus.
pub const TEST_CONFIG: &str = r#"
    [database]
    url = "memory://"

    [storage]
    provider = "memory"
    max_upload_size_bytes = 1048576

    [sync]
    download_chunk_size_bytes = 4

    [auth]
    jwt_secret = "integration-test-secret"

    [logging]
    level = "debug"
    format = "pretty"
"#;

/// SHA-256 of `hello world`.
pub const HELLO_WORLD_SHA256: &str =
    "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state, for direct access to services
    pub state: AppState,
}

/// A buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub raw: Bytes,
    /// Parsed JSON body, `Null` when the body is not JSON.
    pub body: Value,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let config = AppConfig::from_toml(TEST_CONFIG).expect("Failed to parse test config");
        let state = filesync_api::build_state(config)
            .await
            .expect("Failed to build state");
        Self {
            router: filesync_api::build_app(state.clone()),
            state,
        }
    }

    /// Issue a one-hour token for `user_id`.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .verifier
            .issue(&Claims::new(user_id, Utc::now() + Duration::hours(1)))
            .expect("Failed to issue token")
    }

    /// Send a request with an optional JSON body and bearer token.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("Failed to build request"))
            .await
    }

    /// Upload `content` as `file_name` from `device_id`.
    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        device_id: &str,
        content: &'static [u8],
        file_id: Option<Uuid>,
    ) -> TestResponse {
        let mut uri = format!("/api/files/upload?file_name={file_name}&device_id={device_id}");
        if let Some(id) = file_id {
            uri.push_str(&format!("&file_id={id}"));
        }
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(content))
            .expect("Failed to build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let raw = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            raw,
            body,
        }
    }
}
