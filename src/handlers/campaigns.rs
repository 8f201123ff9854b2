// src/handlers/campaigns.rs
//! Pipeline start endpoints. Validation and configuration problems are returned
//! here, before any job exists; everything later is reported on the job.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::error::ApiError;
use crate::jobs::{JobKind, JobPayload, JobSeed};
use crate::models::auth::OwnerId;
use crate::models::campaign::{StartCampaignRequest, StartCampaignResponse};
use crate::workflow::{CampaignInput, PipelineMode};
use crate::workspaces::WorkspaceSeed;
use crate::AppState;

pub fn campaign_routes() -> Router {
    Router::new()
        .route("/api/campaigns", post(start_campaign))
        .route("/api/brands/analyze", post(analyze_brand))
}

fn validate(input: &mut CampaignInput) -> Result<(), ApiError> {
    input.brand_name = input.brand_name.trim().to_string();
    if input.brand_name.is_empty() {
        return Err(ApiError::Validation("brandName is required".to_string()));
    }
    Ok(())
}

/// Non-empty campaign fields as a workspace inputs map
fn inputs_map(input: &CampaignInput) -> Result<Map<String, Value>, ApiError> {
    let value = serde_json::to_value(input).map_err(|e| ApiError::Store(e.into()))?;
    Ok(match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    })
}

/// POST /api/campaigns - Start the full campaign pipeline
async fn start_campaign(
    owner: OwnerId,
    Extension(state): Extension<Arc<AppState>>,
    Json(mut request): Json<StartCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&mut request.input)?;
    let mode = PipelineMode::from(request.mode);
    let executor = state.workflows.executor_for(mode)?;
    let inputs = inputs_map(&request.input)?;

    let workspace_id = match request.workspace_id.as_deref() {
        Some(existing) => {
            // Regeneration: keep the history, refresh the inputs
            if !state.workspaces.update_inputs(owner.as_str(), existing, inputs).await? {
                return Err(ApiError::NotFound("Workspace"));
            }
            existing.to_string()
        }
        None => {
            let brand = request.input.brand_name.clone();
            state
                .workspaces
                .create(
                    owner.as_str(),
                    WorkspaceSeed {
                        name: format!("{} campaign", brand),
                        brand_name: brand,
                        inputs,
                    },
                )
                .await?
                .id
        }
    };

    let job = state
        .jobs
        .create(
            owner.as_str(),
            JobSeed::new(JobKind::Campaign)
                .with_brand_name(request.input.brand_name.clone())
                .with_workspace(workspace_id.clone()),
        )
        .await?;

    tracing::info!(
        job_id = %job.job_id,
        owner_id = %owner.as_str(),
        workspace_id = %workspace_id,
        mode = mode.as_str(),
        "🚀 Campaign job accepted"
    );

    let payload = JobPayload {
        executor,
        input: request.input,
        mode,
        workspace_id: Some(workspace_id.clone()),
    };
    // Detached; progress and outcome are only visible through polling
    let _detached = state
        .processor
        .launch(owner.0.clone(), job.job_id.clone(), payload)
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartCampaignResponse {
            job_id: job.job_id,
            workspace_id: Some(workspace_id),
        }),
    ))
}

/// POST /api/brands/analyze - Strategist-only run, no workspace
async fn analyze_brand(
    owner: OwnerId,
    Extension(state): Extension<Arc<AppState>>,
    Json(mut input): Json<CampaignInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&mut input)?;
    let executor = state.workflows.executor_for(PipelineMode::BrandAnalysis)?;

    let job = state
        .jobs
        .create(
            owner.as_str(),
            JobSeed::new(JobKind::BrandAnalysis).with_brand_name(input.brand_name.clone()),
        )
        .await?;

    let payload = JobPayload {
        executor,
        input,
        mode: PipelineMode::BrandAnalysis,
        workspace_id: None,
    };
    // Detached; progress and outcome are only visible through polling
    let _detached = state
        .processor
        .launch(owner.0.clone(), job.job_id.clone(), payload)
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartCampaignResponse {
            job_id: job.job_id,
            workspace_id: None,
        }),
    ))
}
