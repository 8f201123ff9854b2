// src/jobs/mod.rs
//! Job lifecycle records for background pipeline runs
//! Callers never see a job they don't own: owner mismatch reads exactly like a missing record

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;

pub mod memory;
pub mod postgres;
pub mod processor;
pub mod sweeper;

pub use memory::InMemoryJobBackend;
pub use postgres::PgJobBackend;
pub use processor::{JobPayload, JobProcessor};

/// Unique identifier for a background job
pub type JobId = String;

/// Job status representing the current lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// pending → running → (completed | failed). Skipping `running` is allowed so a
    /// job whose claim write failed can still be closed out.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, _) => true,
            (JobStatus::Running, JobStatus::Pending) => false,
            (JobStatus::Running, _) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Which pipeline a job runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Campaign,
    BrandAnalysis,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Campaign => "campaign",
            JobKind::BrandAnalysis => "brand_analysis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "campaign" => Some(JobKind::Campaign),
            "brand_analysis" => Some(JobKind::BrandAnalysis),
            _ => None,
        }
    }
}

/// Job record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub owner_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub workspace_id: Option<String>,
    pub brand_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Fields a caller may set when creating a job
#[derive(Debug, Clone)]
pub struct JobSeed {
    pub kind: JobKind,
    pub brand_name: Option<String>,
    pub workspace_id: Option<String>,
}

impl JobSeed {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            brand_name: None,
            workspace_id: None,
        }
    }

    pub fn with_brand_name(mut self, brand_name: impl Into<String>) -> Self {
        self.brand_name = Some(brand_name.into());
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }
}

/// Partial update merged into an existing job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub current_step: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn running(step: impl Into<String>, progress: u8) -> Self {
        Self {
            status: Some(JobStatus::Running),
            progress: Some(progress),
            current_step: Some(step.into()),
            ..Self::default()
        }
    }

    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            current_step: Some("completed".to_string()),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            progress: Some(100),
            current_step: Some("failed".to_string()),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl Job {
    pub fn new(owner_id: String, seed: JobSeed) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            owner_id,
            kind: seed.kind,
            status: JobStatus::Pending,
            progress: 0,
            current_step: None,
            result: None,
            error: None,
            workspace_id: seed.workspace_id,
            brand_name: seed.brand_name,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Merge an update. Returns false when the job is terminal and the update was dropped.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        if let Some(next) = update.status {
            if self.status.can_transition_to(next) {
                self.status = next;
            } else {
                tracing::debug!(
                    job_id = %self.job_id,
                    "ignoring status regression {} -> {}",
                    self.status.as_str(),
                    next.as_str()
                );
            }
        }

        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }

        if let Some(step) = update.current_step {
            self.current_step = Some(step);
        }

        match self.status {
            JobStatus::Completed => {
                if update.result.is_some() {
                    self.result = update.result;
                }
                self.error = None;
            }
            JobStatus::Failed => {
                self.error = update
                    .error
                    .or_else(|| self.error.take())
                    .or_else(|| Some("job failed".to_string()));
                self.result = None;
            }
            JobStatus::Pending | JobStatus::Running => {}
        }

        if self.status.is_terminal() {
            self.expires_at = ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()).map(|ttl| now + ttl);
        }

        self.updated_at = now;
        true
    }
}

/// Change applied to a job record while the backend holds it exclusively
pub type JobMutation = Box<dyn FnOnce(&mut Job) -> bool + Send>;

/// Storage backend for job records. Backends are keyed by job id only; ownership is
/// enforced by [`JobStore`].
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;
    async fn fetch(&self, job_id: &str) -> Result<Option<Job>, StoreError>;
    /// Apply `mutation` to the stored record as one atomic read-modify-write.
    /// Nothing is written when the mutation returns false. Returns the written record.
    async fn modify(&self, job_id: &str, mutation: JobMutation) -> Result<Option<Job>, StoreError>;
    /// Newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
    async fn list_running_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError>;
}

/// Owner-scoped job record store
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn JobBackend>,
    ttl: Option<Duration>,
}

impl JobStore {
    pub fn new(backend: Arc<dyn JobBackend>, ttl: Option<Duration>) -> Self {
        Self { backend, ttl }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryJobBackend::new()), None)
    }

    pub async fn create(&self, owner_id: &str, seed: JobSeed) -> Result<Job, StoreError> {
        let job = Job::new(owner_id.to_string(), seed);
        self.backend.insert(&job).await?;
        tracing::info!(job_id = %job.job_id, owner_id = %owner_id, kind = job.kind.as_str(), "🎬 Created job");
        Ok(job)
    }

    pub async fn get(&self, owner_id: &str, job_id: &str) -> Result<Option<Job>, StoreError> {
        let now = Utc::now();
        Ok(self
            .backend
            .fetch(job_id)
            .await?
            .filter(|job| job.owner_id == owner_id && !job.is_expired(now)))
    }

    /// Atomic change to an owned, unexpired job. Returns the record as written.
    async fn mutate<F>(&self, owner_id: &str, job_id: &str, change: F) -> Result<Option<Job>, StoreError>
    where
        F: FnOnce(&mut Job) -> bool + Send + 'static,
    {
        let owner_id = owner_id.to_string();
        let now = Utc::now();
        self.backend
            .modify(
                job_id,
                Box::new(move |job: &mut Job| job.owner_id == owner_id && !job.is_expired(now) && change(job)),
            )
            .await
    }

    /// Merge an update. Missing, foreign, and terminal jobs are left untouched;
    /// returns whether the update was written.
    pub async fn advance(&self, owner_id: &str, job_id: &str, update: JobUpdate) -> Result<bool, StoreError> {
        let ttl = self.ttl;
        let written = self
            .mutate(owner_id, job_id, move |job: &mut Job| {
                let applied = job.apply(update, Utc::now(), ttl);
                if !applied {
                    tracing::warn!(job_id = %job.job_id, status = job.status.as_str(), "dropping update to terminal job");
                }
                applied
            })
            .await?;

        match &written {
            Some(job) => {
                tracing::debug!(job_id = %job_id, status = job.status.as_str(), progress = job.progress, "📊 Updated job")
            }
            None => tracing::debug!(job_id = %job_id, "update not applied"),
        }
        Ok(written.is_some())
    }

    pub async fn update(&self, owner_id: &str, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        self.advance(owner_id, job_id, update).await.map(|_| ())
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
        let now = Utc::now();
        let mut jobs: Vec<Job> = self
            .backend
            .list_for_owner(owner_id)
            .await?
            .into_iter()
            .filter(|job| !job.is_expired(now))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.backend.delete_expired(Utc::now()).await
    }

    /// Fail running jobs that have not been touched within `max_age`.
    pub async fn fail_stalled(&self, max_age: Duration) -> Result<usize, StoreError> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| StoreError::Unavailable(format!("invalid stall window: {}", e)))?;
        let cutoff = Utc::now() - max_age;
        let stalled = self.backend.list_running_before(cutoff).await?;
        let minutes = max_age.num_minutes();

        let mut failed = 0;
        for job in stalled {
            let update = JobUpdate::failed(format!("job stalled: no progress within {} minutes", minutes));
            let ttl = self.ttl;
            // The listing may be stale by now; only fail what is still running and silent
            let written = self
                .mutate(&job.owner_id, &job.job_id, move |current: &mut Job| {
                    current.status == JobStatus::Running
                        && current.updated_at < cutoff
                        && current.apply(update, Utc::now(), ttl)
                })
                .await?;
            if written.is_some() {
                tracing::warn!(job_id = %job.job_id, "⏱️ Marked stalled job as failed");
                failed += 1;
            }
        }
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_ttl(ttl: Option<Duration>) -> JobStore {
        JobStore::new(Arc::new(InMemoryJobBackend::new()), ttl)
    }

    #[tokio::test]
    async fn test_create_starts_pending_with_seed_fields() {
        let store = JobStore::in_memory();
        let job = store
            .create("u1", JobSeed::new(JobKind::Campaign).with_brand_name("Acme").with_workspace("ws-1"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.brand_name.as_deref(), Some("Acme"));

        let fetched = store.get("u1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched, job);
    }

    #[tokio::test]
    async fn test_foreign_owner_reads_as_not_found() {
        let store = JobStore::in_memory();
        let job = store.create("owner-a", JobSeed::new(JobKind::Campaign)).await.unwrap();

        assert!(store.get("owner-b", &job.job_id).await.unwrap().is_none());

        // Foreign updates are dropped too
        store.update("owner-b", &job.job_id, JobUpdate::failed("hijacked")).await.unwrap();
        let job = store.get("owner-a", &job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_job_is_noop() {
        let store = JobStore::in_memory();
        store.update("u1", "does-not-exist", JobUpdate::running("strategist", 10)).await.unwrap();
        assert!(store.list_by_owner("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_status_is_not_overwritten() {
        let store = JobStore::in_memory();
        let job = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();

        store.update("u1", &job.job_id, JobUpdate::running("strategist", 20)).await.unwrap();
        store.update("u1", &job.job_id, JobUpdate::completed(json!({"ok": true}))).await.unwrap();
        // Stale in-flight write arriving after completion
        store.update("u1", &job.job_id, JobUpdate::running("image_generation", 60)).await.unwrap();

        let job = store.get("u1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.current_step.as_deref(), Some("completed"));
        assert_eq!(job.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_progress_never_regresses() {
        let store = JobStore::in_memory();
        let job = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();

        store.update("u1", &job.job_id, JobUpdate::running("a", 50)).await.unwrap();
        store.update("u1", &job.job_id, JobUpdate::running("b", 30)).await.unwrap();

        let job = store.get("u1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(job.progress, 50);
        assert_eq!(job.current_step.as_deref(), Some("b"));
    }

    #[test]
    fn test_result_and_error_are_exclusive() {
        let mut job = Job::new("u1".to_string(), JobSeed::new(JobKind::Campaign));
        job.apply(JobUpdate::running("x", 5), Utc::now(), None);
        job.apply(
            JobUpdate {
                status: Some(JobStatus::Failed),
                result: Some(json!({"leaked": true})),
                ..JobUpdate::default()
            },
            Utc::now(),
            None,
        );

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert_eq!(job.error.as_deref(), Some("job failed"));
    }

    #[test]
    fn test_running_cannot_regress_to_pending() {
        let mut job = Job::new("u1".to_string(), JobSeed::new(JobKind::Campaign));
        job.apply(JobUpdate::running("x", 5), Utc::now(), None);
        job.apply(
            JobUpdate {
                status: Some(JobStatus::Pending),
                ..JobUpdate::default()
            },
            Utc::now(),
            None,
        );
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_terminal_jobs_expire_after_ttl() {
        let store = store_with_ttl(Some(Duration::from_millis(20)));
        let job = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();
        store.update("u1", &job.job_id, JobUpdate::failed("boom")).await.unwrap();

        assert!(store.get("u1", &job.job_id).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("u1", &job.job_id).await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_by_owner_newest_first() {
        let store = JobStore::in_memory();
        let first = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = store.create("u1", JobSeed::new(JobKind::BrandAnalysis)).await.unwrap();
        store.create("u2", JobSeed::new(JobKind::Campaign)).await.unwrap();

        let jobs = store.list_by_owner("u1").await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec![second.job_id.as_str(), first.job_id.as_str()]);
    }

    /// Hands out the running-job listing, then stalls before the caller can act on it
    struct LaggingListing {
        inner: InMemoryJobBackend,
        lag: Duration,
    }

    #[async_trait]
    impl JobBackend for LaggingListing {
        async fn insert(&self, job: &Job) -> Result<(), StoreError> {
            self.inner.insert(job).await
        }
        async fn fetch(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.fetch(job_id).await
        }
        async fn modify(&self, job_id: &str, mutation: JobMutation) -> Result<Option<Job>, StoreError> {
            self.inner.modify(job_id, mutation).await
        }
        async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
            self.inner.list_for_owner(owner_id).await
        }
        async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
            self.inner.delete_expired(now).await
        }
        async fn list_running_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
            let listed = self.inner.list_running_before(cutoff).await?;
            tokio::time::sleep(self.lag).await;
            Ok(listed)
        }
    }

    fn lagging_store() -> JobStore {
        JobStore::new(
            Arc::new(LaggingListing {
                inner: InMemoryJobBackend::new(),
                lag: Duration::from_millis(50),
            }),
            None,
        )
    }

    #[tokio::test]
    async fn test_reaper_never_overwrites_job_completed_after_listing() {
        let store = lagging_store();
        let job = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();
        store.update("u1", &job.job_id, JobUpdate::running("strategist", 10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reaper = {
            let store = store.clone();
            tokio::spawn(async move { store.fail_stalled(Duration::from_millis(1)).await })
        };
        // The reaper now holds a listing that still says running
        tokio::time::sleep(Duration::from_millis(15)).await;
        store.update("u1", &job.job_id, JobUpdate::completed(json!({"ok": true}))).await.unwrap();

        assert_eq!(reaper.await.unwrap().unwrap(), 0);
        let job = store.get("u1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(json!({"ok": true})));
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_reaper_skips_job_that_progressed_after_listing() {
        let store = lagging_store();
        let job = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();
        store.update("u1", &job.job_id, JobUpdate::running("strategist", 10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reaper = {
            let store = store.clone();
            tokio::spawn(async move { store.fail_stalled(Duration::from_millis(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(15)).await;
        store.update("u1", &job.job_id, JobUpdate::running("image_generation", 60)).await.unwrap();

        assert_eq!(reaper.await.unwrap().unwrap(), 0);
        let job = store.get("u1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 60);
    }

    #[tokio::test]
    async fn test_rejected_mutation_leaves_record_untouched() {
        let backend = InMemoryJobBackend::new();
        let job = Job::new("u1".to_string(), JobSeed::new(JobKind::Campaign));
        backend.insert(&job).await.unwrap();

        let written = backend
            .modify(
                &job.job_id,
                Box::new(|job: &mut Job| {
                    job.progress = 99;
                    false
                }),
            )
            .await
            .unwrap();

        assert!(written.is_none());
        assert_eq!(backend.fetch(&job.job_id).await.unwrap().unwrap().progress, 0);
    }

    #[tokio::test]
    async fn test_fail_stalled_marks_only_old_running_jobs() {
        let store = JobStore::in_memory();
        let stalled = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();
        store.update("u1", &stalled.job_id, JobUpdate::running("strategist", 10)).await.unwrap();
        let pending = store.create("u1", JobSeed::new(JobKind::Campaign)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        let failed = store.fail_stalled(Duration::from_millis(10)).await.unwrap();
        assert_eq!(failed, 1);

        let stalled = store.get("u1", &stalled.job_id).await.unwrap().unwrap();
        assert_eq!(stalled.status, JobStatus::Failed);
        assert!(stalled.error.unwrap().starts_with("job stalled"));

        let pending = store.get("u1", &pending.job_id).await.unwrap().unwrap();
        assert_eq!(pending.status, JobStatus::Pending);
    }
}
