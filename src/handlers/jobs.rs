// src/handlers/jobs.rs
//! Job polling endpoints

use axum::{
    extract::{Extension, Path},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::jobs::JobId;
use crate::models::auth::OwnerId;
use crate::models::job::{JobSummary, JobView};
use crate::AppState;

pub fn job_routes() -> Router {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:job_id", get(get_job_status))
}

/// GET /api/jobs - Caller's jobs, newest first
async fn list_jobs(
    owner: OwnerId,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let jobs = state.jobs.list_by_owner(owner.as_str()).await?;
    Ok(Json(jobs.into_iter().map(JobSummary::from).collect()))
}

/// GET /api/jobs/:job_id - Poll one job. Someone else's job reads as missing.
async fn get_job_status(
    owner: OwnerId,
    Path(job_id): Path<JobId>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<JobView>, ApiError> {
    state
        .jobs
        .get(owner.as_str(), &job_id)
        .await?
        .map(|job| Json(JobView::from(job)))
        .ok_or(ApiError::NotFound("Job"))
}
