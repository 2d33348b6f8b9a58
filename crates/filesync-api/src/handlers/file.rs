//! Upload, download and metadata handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use filesync_core::types::pagination::PageResponse;
use filesync_entity::file::FileMetadata;
use filesync_service::file::{UploadFrame, UploadMetadata};

use crate::dto::request::{FolderFilter, UploadQuery, validate};
use crate::dto::response::{ApiResponse, UploadResponse, VersionResponse};
use crate::error::ApiError;
use crate::extractors::{AuthUser, PaginationParams, parse_uuid};
use crate::state::AppState;

/// POST /api/files/upload?file_name=...&device_id=...&file_id=...
///
/// The request body is consumed as a stream; each received body frame is one
/// upload chunk.
pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> Result<(StatusCode, Json<ApiResponse<UploadResponse>>), ApiError> {
    validate(&query)?;

    let opening = UploadFrame::metadata(UploadMetadata {
        file_id: query.file_id,
        file_name: query.file_name,
        device_id: query.device_id,
    });
    let frames = futures::stream::once(async move { Ok::<_, axum::Error>(opening) })
        .chain(body.into_data_stream().map(|chunk| chunk.map(UploadFrame::chunk)));

    let result = state.upload_service.upload(&auth, frames).await?;
    let response = UploadResponse {
        file_id: result.file.id,
        version_id: result.version.id,
        version_number: result.version.version_number,
        content_hash: result.version.content_hash.clone().unwrap_or_default(),
        size_bytes: result.version.size_bytes,
        message: format!(
            "Uploaded {} as version {}",
            result.file.name, result.version.version_number
        ),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

/// GET /api/files/{id}/download
pub async fn download_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_uuid(&id)?;
    let result = state.download_service.download(&auth, id).await?;

    let mut response = Body::from_stream(result.chunks).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&result.file.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        result.file.name.replace('"', "")
    )) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(result.version.size_bytes));
    if let Some(Ok(value)) = result.version.content_hash.as_deref().map(HeaderValue::from_str) {
        headers.insert("x-content-sha256", value);
    }

    Ok(response)
}

/// GET /api/files?folder=...&page=...&page_size=...
pub async fn list_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<FolderFilter>,
) -> Result<Json<ApiResponse<PageResponse<FileMetadata>>>, ApiError> {
    let page = state
        .file_service
        .list_files(&auth, filter.folder.as_deref(), params.into_page_request())
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileMetadata>>, ApiError> {
    let id = parse_uuid(&id)?;
    let metadata = state.file_service.get_metadata(&auth, id).await?;
    Ok(Json(ApiResponse::ok(metadata)))
}

/// GET /api/files/{id}/versions
pub async fn list_versions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<VersionResponse>>>, ApiError> {
    let id = parse_uuid(&id)?;
    let versions = state.sync_coordinator.get_file_versions(&auth, id).await?;
    Ok(Json(ApiResponse::ok(
        versions.into_iter().map(VersionResponse::from).collect(),
    )))
}
