use std::sync::Arc;

use campaign_studio::claude_client::ClaudeClient;
use campaign_studio::config::AppConfig;
use campaign_studio::gemini_client::GeminiClient;
use campaign_studio::handlers::build_router;
use campaign_studio::jobs::sweeper::{spawn_sweeper, SweepConfig};
use campaign_studio::jobs::{JobStore, PgJobBackend};
use campaign_studio::pexels_client::PexelsClient;
use campaign_studio::workflow::CampaignWorkflows;
use campaign_studio::workspaces::{PgWorkspaceBackend, WorkspaceStore};
use campaign_studio::{db, AppState};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let config = AppConfig::from_env().expect("Invalid configuration");

    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        tracing::warn!("Failed to create outputs directory: {}", e);
    } else {
        tracing::info!("Outputs directory ready: {}", config.output_dir);
    }

    let workflows = build_workflows(&config);

    let state = match config.database_url.clone() {
        Some(url) => {
            let pool = db::create_pool(&url)
                .await
                .expect("Failed to create database pool.");
            tracing::info!("Using Postgres job and workspace storage");
            let jobs = JobStore::new(Arc::new(PgJobBackend::new(pool.clone())), config.job_ttl);
            let workspaces = WorkspaceStore::new(Arc::new(PgWorkspaceBackend::new(pool.clone())));
            AppState::new(config.clone(), jobs, workspaces, workflows, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Jobs and workspaces are kept in memory and lost on restart.");
            AppState::in_memory(config.clone(), workflows)
        }
    };
    let shared_state = Arc::new(state);

    let _sweeper = spawn_sweeper(
        shared_state.jobs.clone(),
        SweepConfig {
            interval: config.sweep_interval,
            stale_after: config.stale_job_after,
        },
    );

    let app = build_router(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await.expect("Server error");
}

/// Providers are optional; a pipeline that needs a missing one is refused per request.
fn build_workflows(config: &AppConfig) -> CampaignWorkflows {
    let mut workflows = CampaignWorkflows::new(config.max_ad_images);

    match &config.anthropic_api_key {
        Some(api_key) => {
            let mut client = ClaudeClient::new(api_key.clone());
            if let Some(model) = &config.claude_model {
                client = client.with_model(model.clone());
            }
            tracing::info!("Initializing Claude client ({})...", client.model());
            workflows = workflows.with_text_model(Arc::new(client));
        }
        None => tracing::warn!("ANTHROPIC_API_KEY not found. Campaign pipelines will be disabled."),
    }

    match &config.gemini_api_key {
        Some(api_key) => {
            tracing::info!("Initializing Gemini image client...");
            workflows = workflows.with_image_model(Arc::new(GeminiClient::new(
                api_key.clone(),
                config.output_dir.clone(),
            )));
        }
        None => tracing::warn!("GEMINI_API_KEY not found. Ad image generation will be disabled."),
    }

    match &config.pexels_api_key {
        Some(api_key) => {
            tracing::info!("Initializing Pexels client...");
            workflows = workflows.with_video_source(Arc::new(PexelsClient::new(api_key.clone())));
        }
        None => tracing::warn!("PEXELS_API_KEY not found. Video campaigns will be disabled."),
    }

    workflows
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,campaign_studio=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,campaign_studio=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    tracing::info!("🎯 Campaign Studio starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    let configured = |key: &str| if std::env::var(key).is_ok() { "✅" } else { "❌" };
    tracing::info!(
        "Configuration - Database: {}, Claude: {}, Gemini: {}, Pexels: {}",
        configured("DATABASE_URL"),
        configured("ANTHROPIC_API_KEY"),
        configured("GEMINI_API_KEY"),
        configured("PEXELS_API_KEY")
    );

    Ok(())
}
