// src/jobs/processor.rs
//! Background job processor - runs one pipeline per job and records every
//! outcome on the job record, never to the caller.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

use super::{JobStore, JobUpdate};
use crate::error::StoreError;
use crate::workflow::{
    assemble, CampaignInput, ExecutorError, PipelineMode, PipelineOutcome, PipelineState,
    ProgressSink, WorkflowExecutor,
};
use crate::workspaces::WorkspaceStore;

/// Message stored when the processor itself fails, as opposed to a stage
pub const INTERNAL_FAILURE: &str = "internal error while processing job";

/// Progress written when a job is claimed, before any stage runs
const CLAIM_PROGRESS: u8 = 5;

/// Everything one run needs
pub struct JobPayload {
    pub executor: WorkflowExecutor,
    pub input: CampaignInput,
    pub mode: PipelineMode,
    pub workspace_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("workflow error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Maps `completed` of `planned` stages onto 5..=95
fn progress_for(completed: usize, planned: usize) -> u8 {
    if planned == 0 {
        return CLAIM_PROGRESS;
    }
    let span = 90 * completed.min(planned) / planned;
    CLAIM_PROGRESS + span as u8
}

struct JobProgress<'a> {
    jobs: &'a JobStore,
    owner_id: &'a str,
    job_id: &'a str,
}

#[async_trait]
impl<'a> ProgressSink for JobProgress<'a> {
    async fn stage_started(&self, stage: &str, completed: usize, planned: usize) -> Result<(), StoreError> {
        self.jobs
            .update(
                self.owner_id,
                self.job_id,
                JobUpdate::running(stage, progress_for(completed, planned)),
            )
            .await
    }

    async fn stage_completed(&self, stage: &str, completed: usize, planned: usize) -> Result<(), StoreError> {
        self.jobs
            .update(
                self.owner_id,
                self.job_id,
                JobUpdate::running(stage, progress_for(completed, planned)),
            )
            .await
    }
}

#[derive(Clone)]
pub struct JobProcessor {
    jobs: JobStore,
    workspaces: WorkspaceStore,
}

impl JobProcessor {
    pub fn new(jobs: JobStore, workspaces: WorkspaceStore) -> Self {
        Self { jobs, workspaces }
    }

    /// Run a job to a terminal status. Never returns an error: every failure
    /// ends up on the job record.
    pub async fn process(&self, owner_id: &str, job_id: &str, payload: JobPayload) {
        match self.claim(owner_id, job_id).await {
            Ok(()) => self.run_claimed(owner_id, job_id, payload).await,
            Err(e) => {
                tracing::error!(job_id = %job_id, "❌ Failed to claim job: {}", e);
                self.fail_internal(owner_id, job_id).await;
            }
        }
    }

    /// Mark the job running, then continue in a detached task.
    ///
    /// The claim is written before this returns, so a poll issued right after
    /// the caller responds already sees activity.
    pub async fn launch(&self, owner_id: String, job_id: String, payload: JobPayload) -> JoinHandle<()> {
        let claimed = self.claim(&owner_id, &job_id).await;
        let processor = self.clone();

        tokio::spawn(async move {
            match claimed {
                Ok(()) => processor.run_claimed(&owner_id, &job_id, payload).await,
                Err(e) => {
                    tracing::error!(job_id = %job_id, "❌ Failed to claim job: {}", e);
                    processor.fail_internal(&owner_id, &job_id).await;
                }
            }
        })
    }

    async fn claim(&self, owner_id: &str, job_id: &str) -> Result<(), StoreError> {
        self.jobs
            .update(owner_id, job_id, JobUpdate::running("starting", CLAIM_PROGRESS))
            .await
    }

    async fn run_claimed(&self, owner_id: &str, job_id: &str, payload: JobPayload) {
        let outcome = AssertUnwindSafe(self.drive(owner_id, job_id, payload))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(job_id = %job_id, owner_id = %owner_id, "❌ Job processing error: {}", e);
                self.fail_internal(owner_id, job_id).await;
            }
            Err(_) => {
                tracing::error!(job_id = %job_id, owner_id = %owner_id, "💥 Job processing panicked");
                self.fail_internal(owner_id, job_id).await;
            }
        }
    }

    async fn drive(&self, owner_id: &str, job_id: &str, payload: JobPayload) -> Result<(), ProcessError> {
        let JobPayload {
            executor,
            input,
            mode,
            workspace_id,
        } = payload;

        let sink = JobProgress {
            jobs: &self.jobs,
            owner_id,
            job_id,
        };
        let state = PipelineState::new(job_id, input, mode);
        let final_state = executor.run(state, &sink).await?;

        match assemble(&final_state) {
            PipelineOutcome::Success(result) => {
                let value = serde_json::to_value(&result)?;

                // Version first so a completed poll implies the version exists
                if let Some(workspace_id) = &workspace_id {
                    // Only a run that still holds its job may version it. The touch also
                    // refreshes updated_at so the stalled-job reaper leaves it alone.
                    let still_open = self
                        .jobs
                        .advance(owner_id, job_id, JobUpdate::running("saving results", progress_for(1, 1)))
                        .await?;
                    if !still_open {
                        tracing::warn!(job_id = %job_id, "Job closed before results were saved; no version recorded");
                        return Ok(());
                    }

                    let appended = self
                        .workspaces
                        .append_version(owner_id, workspace_id, job_id, value.clone())
                        .await?;
                    if !appended {
                        tracing::warn!(job_id = %job_id, workspace_id = %workspace_id, "Workspace version not appended");
                    }
                }

                self.jobs.update(owner_id, job_id, JobUpdate::completed(value)).await?;
                tracing::info!(job_id = %job_id, "✅ Job completed");
            }
            PipelineOutcome::Failure(message) => {
                tracing::warn!(job_id = %job_id, "Job failed: {}", message);
                self.jobs.update(owner_id, job_id, JobUpdate::failed(message)).await?;
            }
        }
        Ok(())
    }

    /// Best effort: if the store is down this can fail too, and the job stays
    /// running until the sweeper reaps it.
    async fn fail_internal(&self, owner_id: &str, job_id: &str) {
        if let Err(e) = self
            .jobs
            .update(owner_id, job_id, JobUpdate::failed(INTERNAL_FAILURE))
            .await
        {
            tracing::error!(job_id = %job_id, "❌ Could not record job failure: {}", e);
        }
    }
}
