// src/handlers/status.rs
use axum::{extract::Extension, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::workflow::PipelineMode;
use crate::AppState;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

fn configured(present: bool) -> &'static str {
    if present {
        "configured"
    } else {
        "not_configured"
    }
}

/// GET /api/status - Service health and which pipelines can run
async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let storage = match &state.db_pool {
        Some(pool) => match sqlx::query("SELECT 1").fetch_one(pool).await {
            Ok(_) => "postgres (healthy)",
            Err(_) => "postgres (unhealthy)",
        },
        None => "memory",
    };

    let workflows = &state.workflows;
    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
        "services": {
            "text_generation": configured(workflows.has_text_model()),
            "image_generation": configured(workflows.has_image_model()),
            "stock_video": configured(workflows.has_video_source()),
        },
        "pipelines": {
            "video": workflows.ensure_available(PipelineMode::Video).is_ok(),
            "poster": workflows.ensure_available(PipelineMode::Poster).is_ok(),
            "brand_analysis": workflows.ensure_available(PipelineMode::BrandAnalysis).is_ok(),
        },
        "jobs": {
            "ttl_hours": state.config.job_ttl.map(|ttl| ttl.as_secs() / 3600),
            "stalled_after_minutes": state.config.stale_job_after.map(|d| d.as_secs() / 60),
        }
    }))
}
