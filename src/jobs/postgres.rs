// src/jobs/postgres.rs
//! PostgreSQL job backend for multi-instance deployments

use super::{Job, JobBackend, JobKind, JobMutation, JobStatus};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

const JOB_COLUMNS: &str = "job_id, owner_id, kind, status, progress, current_step, result, error, \
                           workspace_id, brand_name, created_at, updated_at, expires_at";

#[derive(Debug, FromRow)]
struct JobRow {
    job_id: String,
    owner_id: String,
    kind: String,
    status: String,
    progress: i16,
    current_step: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    workspace_id: Option<String>,
    brand_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown job status '{}' for job {}", row.status, row.job_id))
        })?;
        let kind = JobKind::parse(&row.kind).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown job kind '{}' for job {}", row.kind, row.job_id))
        })?;

        Ok(Job {
            job_id: row.job_id,
            owner_id: row.owner_id,
            kind,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            current_step: row.current_step,
            result: row.result,
            error: row.error,
            workspace_id: row.workspace_id,
            brand_name: row.brand_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }
}

fn rows_to_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, StoreError> {
    rows.into_iter().map(Job::try_from).collect()
}

pub struct PgJobBackend {
    pool: PgPool,
}

impl PgJobBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobBackend for PgJobBackend {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO campaign_jobs
            (job_id, owner_id, kind, status, progress, current_step, result, error,
             workspace_id, brand_name, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.owner_id)
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.current_step)
        .bind(&job.result)
        .bind(&job.error)
        .bind(&job.workspace_id)
        .bind(&job.brand_name)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM campaign_jobs WHERE job_id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn modify(&self, job_id: &str, mutation: JobMutation) -> Result<Option<Job>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent writers (processor, sweeper) on one job
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM campaign_jobs WHERE job_id = $1 FOR UPDATE",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut job = Job::try_from(row)?;
        if !mutation(&mut job) {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE campaign_jobs
            SET status = $2, progress = $3, current_step = $4, result = $5, error = $6,
                updated_at = $7, expires_at = $8
            WHERE job_id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(&job.job_id)
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.current_step)
        .bind(&job.result)
        .bind(&job.error)
        .bind(job.updated_at)
        .bind(job.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM campaign_jobs WHERE owner_id = $1 ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows_to_jobs(rows)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM campaign_jobs WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn list_running_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM campaign_jobs WHERE status = 'running' AND updated_at < $1",
            JOB_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows_to_jobs(rows)
    }
}
