use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::{Job, JobKind, JobStatus};

/// What a poll returns. `result` and `error` only appear once the job is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let (result, error) = match job.status {
            JobStatus::Completed => (job.result, None),
            JobStatus::Failed => (None, job.error),
            JobStatus::Pending | JobStatus::Running => (None, None),
        };
        Self {
            job_id: job.job_id,
            kind: job.kind,
            status: job.status,
            progress: job.progress,
            current_step: job.current_step,
            result,
            error,
            workspace_id: job.workspace_id,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// List entry without the result payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
    pub brand_name: Option<String>,
    pub workspace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            kind: job.kind,
            status: job.status,
            progress: job.progress,
            brand_name: job.brand_name,
            workspace_id: job.workspace_id,
            created_at: job.created_at,
        }
    }
}
