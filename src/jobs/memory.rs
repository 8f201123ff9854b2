// src/jobs/memory.rs
//! Process-local job backend. Nothing survives a restart; use for single-instance runs and tests.

use super::{Job, JobBackend, JobId, JobMutation, JobStatus};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryJobBackend {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobBackend for InMemoryJobBackend {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(job_id).cloned())
    }

    async fn modify(&self, job_id: &str, mutation: JobMutation) -> Result<Option<Job>, StoreError> {
        // Held for the whole read-modify-write
        let mut jobs = self.jobs.write().await;
        let Some(stored) = jobs.get_mut(job_id) else {
            return Ok(None);
        };
        let mut draft = stored.clone();
        if !mutation(&mut draft) {
            return Ok(None);
        }
        *stored = draft.clone();
        Ok(Some(draft))
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<Job> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired(now));
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::debug!("🗑️ Cleaned up {} expired jobs", removed);
        }
        Ok(removed)
    }

    async fn list_running_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.status == JobStatus::Running && job.updated_at < cutoff)
            .cloned()
            .collect())
    }
}
