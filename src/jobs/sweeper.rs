// src/jobs/sweeper.rs
//! Periodic housekeeping: drop expired terminal jobs and, when enabled, fail
//! running jobs that stopped making progress.

use std::time::Duration;
use tokio::task::JoinHandle;

use super::JobStore;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub interval: Duration,
    /// `None` leaves stalled jobs running
    pub stale_after: Option<Duration>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub purged: usize,
    pub stalled: usize,
}

/// One sweep pass
pub async fn sweep_once(jobs: &JobStore, stale_after: Option<Duration>) -> Result<SweepReport, StoreError> {
    let purged = jobs.purge_expired().await?;
    let stalled = match stale_after {
        Some(max_age) => jobs.fail_stalled(max_age).await?,
        None => 0,
    };
    Ok(SweepReport { purged, stalled })
}

/// Run `sweep_once` every `config.interval` until the runtime shuts down
pub fn spawn_sweeper(jobs: JobStore, config: SweepConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sweep_once(&jobs, config.stale_after).await {
                Ok(report) if report.purged > 0 || report.stalled > 0 => {
                    tracing::info!(purged = report.purged, stalled = report.stalled, "🧹 Job sweep finished");
                }
                Ok(_) => tracing::debug!("🧹 Job sweep found nothing to do"),
                Err(e) => tracing::error!("❌ Job sweep failed: {}", e),
            }
        }
    })
}
