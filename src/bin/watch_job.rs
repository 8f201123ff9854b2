//! Starts a campaign against a running server and prints job progress until it ends.
//!
//! Env: CAMPAIGN_API_URL (default http://localhost:3000), CAMPAIGN_API_TOKEN,
//! BRAND_NAME, CAMPAIGN_GOAL, CHANNEL, CAMPAIGN_MODE (video | poster).
use std::sync::{Arc, Mutex};
use std::time::Duration;

use campaign_studio::client::CampaignClient;
use campaign_studio::jobs::JobStatus;
use campaign_studio::models::campaign::{CampaignMode, StartCampaignRequest};
use campaign_studio::models::job::JobView;
use campaign_studio::workflow::CampaignInput;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let base_url = std::env::var("CAMPAIGN_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let token = std::env::var("CAMPAIGN_API_TOKEN").map_err(|_| "CAMPAIGN_API_TOKEN must be set")?;
    let brand_name = std::env::var("BRAND_NAME").map_err(|_| "BRAND_NAME must be set")?;

    let mode = match std::env::var("CAMPAIGN_MODE").as_deref() {
        Ok("poster") => CampaignMode::Poster,
        _ => CampaignMode::Video,
    };
    let input = CampaignInput {
        campaign_goal: std::env::var("CAMPAIGN_GOAL").ok(),
        channel: std::env::var("CHANNEL").ok(),
        ..CampaignInput::new(brand_name)
    };

    let client = CampaignClient::new(base_url, token);
    let started = client
        .start_campaign(&StartCampaignRequest {
            input,
            mode,
            workspace_id: None,
        })
        .await?;
    println!("🚀 Job {} started", started.job_id);
    if let Some(workspace_id) = &started.workspace_id {
        println!("   Workspace: {}", workspace_id);
    }

    let last: Arc<Mutex<Option<JobView>>> = Arc::new(Mutex::new(None));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let last_sink = last.clone();
    let failure_sink = failure.clone();

    let poller = client
        .watch_job(started.job_id.clone(), Duration::from_secs(2))
        .on_success(move |job: &JobView| {
            println!(
                "   {:>3}% {:?} {}",
                job.progress,
                job.status,
                job.current_step.as_deref().unwrap_or("")
            );
            if let Ok(mut slot) = last_sink.lock() {
                *slot = Some(job.clone());
            }
        })
        .on_error(move |message| {
            if let Ok(mut slot) = failure_sink.lock() {
                *slot = Some(message);
            }
        });

    poller.start();
    tokio::select! {
        _ = poller.join() => {}
        _ = tokio::signal::ctrl_c() => {
            poller.stop();
            println!("Stopped watching; the job keeps running on the server.");
            return Ok(());
        }
    }

    if let Some(message) = failure.lock().map_err(|_| "poisoned")?.take() {
        return Err(format!("polling failed: {}", message).into());
    }

    let final_view = last.lock().map_err(|_| "poisoned")?.take();
    match final_view {
        Some(job) if job.status == JobStatus::Completed => {
            println!("✅ Completed");
            println!("{}", serde_json::to_string_pretty(&job.result)?);
        }
        Some(job) => {
            println!("❌ Failed: {}", job.error.unwrap_or_default());
            std::process::exit(1);
        }
        None => println!("No status received"),
    }
    Ok(())
}
