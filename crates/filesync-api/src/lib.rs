//! # filesync-api
//!
//! HTTP API layer for FileSync built on Axum.
//!
//! Maps the upload, download, metadata and sync operations onto REST routes
//! and the watch stream onto a WebSocket, verifies bearer tokens, and turns
//! domain errors into JSON error responses.

pub mod app;
pub mod auth;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, build_state, run_server};
pub use error::ApiError;
pub use state::AppState;
