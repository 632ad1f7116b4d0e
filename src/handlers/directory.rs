use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::debug;

use super::{user, Identity, PathQuery};
use crate::{error::Result, server::AppState};

// List the immediate children of a directory
pub async fn list_directory(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse> {
    debug!("Listing directory: {:?}", query.path);
    let children = state
        .resources
        .list_directory(&query.path, user(&identity))
        .await?;
    Ok(Json(children))
}

// Create an empty folder
pub async fn create_directory(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse> {
    let created = state
        .resources
        .create_empty_folder(&query.path, user(&identity))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
