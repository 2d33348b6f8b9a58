//! Health check handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let database = probe(state.store.health_check().await, "connected", "unreachable");
    let storage = probe(state.blobs.health_check().await, "available", "unavailable");
    let healthy = database.0 && storage.0;

    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.1.to_string(),
        storage: storage.1.to_string(),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ApiResponse::ok(body)))
}

fn probe(
    result: filesync_core::AppResult<bool>,
    up: &'static str,
    down: &'static str,
) -> (bool, &'static str) {
    match result {
        Ok(true) => (true, up),
        Ok(false) => (false, down),
        Err(e) => {
            tracing::warn!(error = %e, "Health probe failed");
            (false, down)
        }
    }
}
