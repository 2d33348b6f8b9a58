//! Sync check and conflict resolution handlers.

use axum::Json;
use axum::extract::State;

use filesync_entity::sync::SyncCheck;

use crate::dto::request::{ResolveConflictRequest, SyncFileRequest, validate};
use crate::dto::response::{ApiResponse, ResolveConflictResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/sync/check
pub async fn check_sync(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SyncFileRequest>,
) -> Result<Json<ApiResponse<SyncCheck>>, ApiError> {
    validate(&req)?;
    let check = state
        .sync_coordinator
        .check_sync(&auth, req.file_id, &req.device_id, &req.file_hash)
        .await?;
    Ok(Json(ApiResponse::ok(check)))
}

/// POST /api/sync/resolve
pub async fn resolve_conflict(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ResolveConflictRequest>,
) -> Result<Json<ApiResponse<ResolveConflictResponse>>, ApiError> {
    validate(&req)?;
    let losing = req.losing_version_ids.len();
    let version = state
        .sync_coordinator
        .resolve_conflict(&auth, req.file_id, req.losing_version_ids, req.winning_version_id)
        .await?;

    Ok(Json(ApiResponse::ok(ResolveConflictResponse {
        success: true,
        message: format!(
            "Resolved {losing} version(s) into version {}",
            version.version_number
        ),
        new_version_id: version.id,
    })))
}
