// src/handlers/workspaces.rs
//! Workspace endpoints

use axum::{
    extract::{Extension, Path},
    response::Json,
    routing::{get, patch},
    Router,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::error::ApiError;
use crate::models::auth::OwnerId;
use crate::models::workspace::{WorkspaceSummary, WorkspaceView};
use crate::workspaces::Version;
use crate::AppState;

pub fn workspace_routes() -> Router {
    Router::new()
        .route("/api/workspaces", get(list_workspaces))
        .route("/api/workspaces/:id", get(get_workspace))
        .route("/api/workspaces/:id/inputs", patch(update_inputs))
        .route("/api/workspaces/:id/versions", get(list_versions))
}

async fn list_workspaces(
    owner: OwnerId,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<WorkspaceSummary>>, ApiError> {
    let workspaces = state.workspaces.list_by_owner(owner.as_str()).await?;
    Ok(Json(workspaces.into_iter().map(WorkspaceSummary::from).collect()))
}

async fn get_workspace(
    owner: OwnerId,
    Path(id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<WorkspaceView>, ApiError> {
    state
        .workspaces
        .get(owner.as_str(), &id)
        .await?
        .map(|ws| Json(WorkspaceView::from(ws)))
        .ok_or(ApiError::NotFound("Workspace"))
}

/// PATCH /api/workspaces/:id/inputs - Shallow merge; versions are untouched
async fn update_inputs(
    owner: OwnerId,
    Path(id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    Json(partial): Json<Map<String, Value>>,
) -> Result<Json<WorkspaceView>, ApiError> {
    if !state.workspaces.update_inputs(owner.as_str(), &id, partial).await? {
        return Err(ApiError::NotFound("Workspace"));
    }
    get_workspace(owner, Path(id), Extension(state)).await
}

async fn list_versions(
    owner: OwnerId,
    Path(id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Version>>, ApiError> {
    state
        .workspaces
        .versions(owner.as_str(), &id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Workspace"))
}
