use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::{user, Identity, MoveQuery, PathQuery, SearchQuery};
use crate::{
    error::{Error, Result},
    models::UploadFile,
    server::AppState,
};

/// Multipart field carrying the uploaded files.
const UPLOAD_FIELD: &str = "object";

// Health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// Get resource info
pub async fn get_resource_info(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse> {
    let descriptor = state.resources.get_info(&query.path, user(&identity)).await?;
    Ok(Json(descriptor))
}

// Delete a file or a whole directory
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse> {
    state.resources.delete(&query.path, user(&identity)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Download a file, or a directory as zip
pub async fn download_resource(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<PathQuery>,
) -> Result<Response> {
    let download = state.resources.download(&query.path, user(&identity)).await?;
    debug!(
        "Sending {} ({} bytes)",
        download.filename,
        download.data.len()
    );

    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&download.filename)
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, download.data.len())
        .body(Body::from(download.data))
        .map_err(|e| Error::OperationFailed(format!("failed to build download response: {}", e)))
}

// Move or rename
pub async fn move_resource(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<MoveQuery>,
) -> Result<impl IntoResponse> {
    let moved = state
        .resources
        .move_resource(&query.from, &query.to, user(&identity))
        .await?;
    Ok(Json(moved))
}

// Search by name
pub async fn search_resources(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let results = state.resources.search(&query.query, user(&identity)).await?;
    Ok(Json(results))
}

// Upload one or more files; file names may carry sub-directories
pub async fn upload_resources(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    // Anonymous uploads are refused before the body is read.
    let uploader = user(&identity).ok_or(Error::UserNotFound)?;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let relative_path = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("failed to read upload: {}", e)))?;

        files.push(UploadFile {
            relative_path,
            content_type,
            data,
        });
    }

    info!("Uploading {} file(s) to {:?}", files.len(), query.path);
    let uploaded = state
        .resources
        .upload(files, &query.path, Some(uploader))
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}
