// src/workspaces/mod.rs
//! Campaign workspaces: named, owner-scoped containers holding an append-only
//! history of pipeline output versions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryWorkspaceBackend;
pub use postgres::PgWorkspaceBackend;

/// One immutable snapshot of pipeline output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub outputs: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub brand_name: String,
    pub inputs: Map<String, Value>,
    pub versions: Vec<Version>,
    pub current_version_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn current_version(&self) -> Option<&Version> {
        let current = self.current_version_id.as_deref()?;
        self.versions.iter().find(|v| v.id == current)
    }

    /// Shallow key merge. Versions are untouched.
    pub fn merge_inputs(&mut self, partial: Map<String, Value>, now: DateTime<Utc>) {
        for (key, value) in partial {
            self.inputs.insert(key, value);
        }
        self.updated_at = now;
    }

    /// Append a version and make it current. Returns false if the id is already present.
    pub fn push_version(&mut self, version: Version) -> bool {
        if self.versions.iter().any(|v| v.id == version.id) {
            return false;
        }
        self.updated_at = version.created_at;
        self.current_version_id = Some(version.id.clone());
        self.versions.push(version);
        true
    }
}

/// Fields used when creating a workspace
#[derive(Debug, Clone)]
pub struct WorkspaceSeed {
    pub name: String,
    pub brand_name: String,
    pub inputs: Map<String, Value>,
}

/// Storage backend for workspaces. Implementations must make `merge_inputs` and
/// `append_version` atomic per workspace so concurrent appends never lose a version.
#[async_trait]
pub trait WorkspaceBackend: Send + Sync {
    async fn insert(&self, workspace: &Workspace) -> Result<(), StoreError>;
    async fn fetch(&self, workspace_id: &str) -> Result<Option<Workspace>, StoreError>;
    /// Returns false when the workspace does not exist.
    async fn merge_inputs(&self, workspace_id: &str, partial: Map<String, Value>) -> Result<bool, StoreError>;
    /// Returns false when the workspace does not exist. Duplicate version ids are skipped.
    async fn append_version(&self, workspace_id: &str, version: Version) -> Result<bool, StoreError>;
    /// Newest first by `updated_at`.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Workspace>, StoreError>;
}

/// Owner-scoped workspace store
#[derive(Clone)]
pub struct WorkspaceStore {
    backend: Arc<dyn WorkspaceBackend>,
}

impl WorkspaceStore {
    pub fn new(backend: Arc<dyn WorkspaceBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryWorkspaceBackend::new()))
    }

    pub async fn create(&self, owner_id: &str, seed: WorkspaceSeed) -> Result<Workspace, StoreError> {
        let now = Utc::now();
        let workspace = Workspace {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: seed.name,
            brand_name: seed.brand_name,
            inputs: seed.inputs,
            versions: Vec::new(),
            current_version_id: None,
            created_at: now,
            updated_at: now,
        };
        self.backend.insert(&workspace).await?;
        tracing::info!(workspace_id = %workspace.id, owner_id = %owner_id, "📁 Created workspace");
        Ok(workspace)
    }

    pub async fn get(&self, owner_id: &str, workspace_id: &str) -> Result<Option<Workspace>, StoreError> {
        Ok(self
            .backend
            .fetch(workspace_id)
            .await?
            .filter(|ws| ws.owner_id == owner_id))
    }

    /// Returns false when the workspace is missing or not owned by `owner_id`.
    pub async fn update_inputs(
        &self,
        owner_id: &str,
        workspace_id: &str,
        partial: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        if self.get(owner_id, workspace_id).await?.is_none() {
            return Ok(false);
        }
        self.backend.merge_inputs(workspace_id, partial).await
    }

    /// Returns false when the workspace is missing or not owned by `owner_id`.
    pub async fn append_version(
        &self,
        owner_id: &str,
        workspace_id: &str,
        version_id: &str,
        outputs: Value,
    ) -> Result<bool, StoreError> {
        if self.get(owner_id, workspace_id).await?.is_none() {
            return Ok(false);
        }
        let version = Version {
            id: version_id.to_string(),
            outputs,
            created_at: Utc::now(),
        };
        let appended = self.backend.append_version(workspace_id, version).await?;
        if appended {
            tracing::info!(workspace_id = %workspace_id, version_id = %version_id, "📌 Appended workspace version");
        }
        Ok(appended)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Workspace>, StoreError> {
        let mut workspaces = self.backend.list_for_owner(owner_id).await?;
        workspaces.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(workspaces)
    }

    pub async fn versions(&self, owner_id: &str, workspace_id: &str) -> Result<Option<Vec<Version>>, StoreError> {
        Ok(self.get(owner_id, workspace_id).await?.map(|ws| ws.versions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed(brand: &str) -> WorkspaceSeed {
        let mut inputs = Map::new();
        inputs.insert("brandName".to_string(), json!(brand));
        inputs.insert("channel".to_string(), json!("instagram"));
        WorkspaceSeed {
            name: format!("{} campaign", brand),
            brand_name: brand.to_string(),
            inputs,
        }
    }

    #[tokio::test]
    async fn test_create_starts_with_no_versions() {
        let store = WorkspaceStore::in_memory();
        let ws = store.create("u1", seed("Acme")).await.unwrap();

        assert!(ws.versions.is_empty());
        assert!(ws.current_version_id.is_none());
        assert!(ws.current_version().is_none());
        assert_eq!(store.get("u1", &ws.id).await.unwrap(), Some(ws));
    }

    #[tokio::test]
    async fn test_foreign_owner_cannot_read_or_write() {
        let store = WorkspaceStore::in_memory();
        let ws = store.create("u1", seed("Acme")).await.unwrap();

        assert!(store.get("u2", &ws.id).await.unwrap().is_none());
        assert!(!store.append_version("u2", &ws.id, "v1", json!({})).await.unwrap());
        assert!(!store.update_inputs("u2", &ws.id, Map::new()).await.unwrap());

        let ws = store.get("u1", &ws.id).await.unwrap().unwrap();
        assert!(ws.versions.is_empty());
    }

    #[tokio::test]
    async fn test_update_inputs_merges_without_touching_versions() {
        let store = WorkspaceStore::in_memory();
        let ws = store.create("u1", seed("Acme")).await.unwrap();
        store.append_version("u1", &ws.id, "job-1", json!({"images": 1})).await.unwrap();

        let mut partial = Map::new();
        partial.insert("channel".to_string(), json!("tiktok"));
        partial.insert("tone".to_string(), json!("playful"));
        assert!(store.update_inputs("u1", &ws.id, partial).await.unwrap());

        let ws = store.get("u1", &ws.id).await.unwrap().unwrap();
        assert_eq!(ws.inputs["brandName"], json!("Acme"));
        assert_eq!(ws.inputs["channel"], json!("tiktok"));
        assert_eq!(ws.inputs["tone"], json!("playful"));
        assert_eq!(ws.versions.len(), 1);
    }

    #[tokio::test]
    async fn test_append_keeps_history_and_moves_current() {
        let store = WorkspaceStore::in_memory();
        let ws = store.create("u1", seed("Acme")).await.unwrap();

        store.append_version("u1", &ws.id, "job-1", json!({"n": 1})).await.unwrap();
        store.append_version("u1", &ws.id, "job-2", json!({"n": 2})).await.unwrap();
        // Re-appending an existing id never rewrites history
        store.append_version("u1", &ws.id, "job-1", json!({"n": 99})).await.unwrap();

        let ws = store.get("u1", &ws.id).await.unwrap().unwrap();
        let ids: Vec<&str> = ws.versions.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["job-1", "job-2"]);
        assert_eq!(ws.versions[0].outputs, json!({"n": 1}));
        assert_eq!(ws.current_version().unwrap().outputs, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = WorkspaceStore::in_memory();
        let ws = store.create("u1", seed("Acme")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let ws_id = ws.id.clone();
                tokio::spawn(async move {
                    store
                        .append_version("u1", &ws_id, &format!("job-{}", i), json!({ "i": i }))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap());
        }

        let ws = store.get("u1", &ws.id).await.unwrap().unwrap();
        assert_eq!(ws.versions.len(), 16);
        let current = ws.current_version_id.clone().unwrap();
        assert!(ws.versions.iter().any(|v| v.id == current));
    }

    #[tokio::test]
    async fn test_list_by_owner_most_recently_updated_first() {
        let store = WorkspaceStore::in_memory();
        let older = store.create("u1", seed("Acme")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = store.create("u1", seed("Globex")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append_version("u1", &older.id, "job-1", json!({})).await.unwrap();
        store.create("u2", seed("Initech")).await.unwrap();

        let listed = store.list_by_owner("u1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec![older.id.as_str(), newer.id.as_str()]);
    }
}
