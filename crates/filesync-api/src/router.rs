//! Route definitions for the FileSync HTTP API.
//!
//! File and sync routes are mounted under `/api`; the health probe sits at
//! the root. The router receives `AppState` and passes it to all handlers via
//! Axum's `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

/// Upper bound for JSON request bodies. Upload bodies are streamed and
/// bounded by `storage.max_upload_size_bytes` inside the upload pipeline.
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new().merge(file_routes()).merge(sync_routes());

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state)
}

/// Upload, download, metadata and version history
fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/files", get(handlers::file::list_files))
        .route(
            "/files/upload",
            post(handlers::file::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/files/{id}", get(handlers::file::get_file))
        .route("/files/{id}/download", get(handlers::file::download_file))
        .route("/files/{id}/versions", get(handlers::file::list_versions))
}

/// Sync checks, conflict resolution and the watch stream
fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sync/check", post(handlers::sync::check_sync))
        .route("/sync/resolve", post(handlers::sync::resolve_conflict))
        .route("/sync/watch", get(handlers::ws::watch_changes))
}
