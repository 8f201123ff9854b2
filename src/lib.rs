// lib.rs - Campaign generation service: stores, pipeline, background jobs, HTTP API
pub mod claude_client;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod gemini_client;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod pexels_client;
pub mod polling;
pub mod providers;
pub mod stages;
pub mod workflow;
pub mod workspaces;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::jobs::{JobProcessor, JobStore};
use crate::middleware::auth::JwtKeys;
use crate::workflow::CampaignWorkflows;
use crate::workspaces::WorkspaceStore;

/// Shared state handed to every handler through an `Extension<Arc<AppState>>`
pub struct AppState {
    pub config: AppConfig,
    pub jobs: JobStore,
    pub workspaces: WorkspaceStore,
    pub workflows: CampaignWorkflows,
    pub processor: JobProcessor,
    pub jwt: JwtKeys,
    /// Present when running on Postgres
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        jobs: JobStore,
        workspaces: WorkspaceStore,
        workflows: CampaignWorkflows,
        db_pool: Option<PgPool>,
    ) -> Self {
        let processor = JobProcessor::new(jobs.clone(), workspaces.clone());
        let jwt = JwtKeys::new(&config.jwt_secret);
        Self {
            config,
            jobs,
            workspaces,
            workflows,
            processor,
            jwt,
            db_pool,
        }
    }

    /// In-memory stores and the given providers; used by tests and local runs
    pub fn in_memory(config: AppConfig, workflows: CampaignWorkflows) -> Self {
        let jobs = JobStore::new(
            std::sync::Arc::new(jobs::InMemoryJobBackend::new()),
            config.job_ttl,
        );
        Self::new(config, jobs, WorkspaceStore::in_memory(), workflows, None)
    }
}
