// src/workspaces/postgres.rs
//! PostgreSQL workspace backend. Versions live in a JSONB array; appends are a single
//! UPDATE so Postgres row locking serializes concurrent appends to one workspace.

use super::{Version, Workspace, WorkspaceBackend};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};

const WORKSPACE_COLUMNS: &str =
    "id, owner_id, name, brand_name, inputs, versions, current_version_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct WorkspaceRow {
    id: String,
    owner_id: String,
    name: String,
    brand_name: String,
    inputs: Value,
    versions: Value,
    current_version_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = StoreError;

    fn try_from(row: WorkspaceRow) -> Result<Self, Self::Error> {
        let inputs = match row.inputs {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(StoreError::Unavailable(format!(
                    "workspace {} has non-object inputs: {}",
                    row.id, other
                )))
            }
        };
        let versions: Vec<Version> = serde_json::from_value(row.versions)?;

        Ok(Workspace {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            brand_name: row.brand_name,
            inputs,
            versions,
            current_version_id: row.current_version_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgWorkspaceBackend {
    pool: PgPool,
}

impl PgWorkspaceBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, workspace_id: &str) -> Result<bool, StoreError> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM campaign_workspaces WHERE id = $1")
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl WorkspaceBackend for PgWorkspaceBackend {
    async fn insert(&self, workspace: &Workspace) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO campaign_workspaces
            (id, owner_id, name, brand_name, inputs, versions, current_version_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&workspace.id)
        .bind(&workspace.owner_id)
        .bind(&workspace.name)
        .bind(&workspace.brand_name)
        .bind(Value::Object(workspace.inputs.clone()))
        .bind(serde_json::to_value(&workspace.versions)?)
        .bind(&workspace.current_version_id)
        .bind(workspace.created_at)
        .bind(workspace.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, workspace_id: &str) -> Result<Option<Workspace>, StoreError> {
        let row = sqlx::query_as::<_, WorkspaceRow>(&format!(
            "SELECT {} FROM campaign_workspaces WHERE id = $1",
            WORKSPACE_COLUMNS
        ))
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Workspace::try_from).transpose()
    }

    async fn merge_inputs(&self, workspace_id: &str, partial: Map<String, Value>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE campaign_workspaces SET inputs = inputs || $2, updated_at = $3 WHERE id = $1",
        )
        .bind(workspace_id)
        .bind(Value::Object(partial))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_version(&self, workspace_id: &str, version: Version) -> Result<bool, StoreError> {
        let version_id = version.id.clone();
        let created_at = version.created_at;
        let version_json = serde_json::to_value(&version)?;

        let result = sqlx::query(
            r#"
            UPDATE campaign_workspaces
            SET versions = versions || jsonb_build_array($2::jsonb),
                current_version_id = $3,
                updated_at = $4
            WHERE id = $1
              AND NOT (versions @> jsonb_build_array(jsonb_build_object('id', $3::text)))
            "#,
        )
        .bind(workspace_id)
        .bind(version_json)
        .bind(&version_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Either the workspace is gone or this version id was already recorded
        let exists = self.exists(workspace_id).await?;
        if exists {
            tracing::warn!(workspace_id = %workspace_id, version_id = %version_id, "version id already present, skipping append");
        }
        Ok(exists)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Workspace>, StoreError> {
        let rows = sqlx::query_as::<_, WorkspaceRow>(&format!(
            "SELECT {} FROM campaign_workspaces WHERE owner_id = $1 ORDER BY updated_at DESC",
            WORKSPACE_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Workspace::try_from).collect()
    }
}
