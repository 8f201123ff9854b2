// src/workspaces/memory.rs
use super::{Version, Workspace, WorkspaceBackend};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local workspace backend. Every mutation happens under the map's write
/// lock, which serializes appends to the same workspace.
#[derive(Default)]
pub struct InMemoryWorkspaceBackend {
    workspaces: RwLock<HashMap<String, Workspace>>,
}

impl InMemoryWorkspaceBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceBackend for InMemoryWorkspaceBackend {
    async fn insert(&self, workspace: &Workspace) -> Result<(), StoreError> {
        let mut workspaces = self.workspaces.write().await;
        workspaces.insert(workspace.id.clone(), workspace.clone());
        Ok(())
    }

    async fn fetch(&self, workspace_id: &str) -> Result<Option<Workspace>, StoreError> {
        let workspaces = self.workspaces.read().await;
        Ok(workspaces.get(workspace_id).cloned())
    }

    async fn merge_inputs(&self, workspace_id: &str, partial: Map<String, Value>) -> Result<bool, StoreError> {
        let mut workspaces = self.workspaces.write().await;
        match workspaces.get_mut(workspace_id) {
            Some(ws) => {
                ws.merge_inputs(partial, Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_version(&self, workspace_id: &str, version: Version) -> Result<bool, StoreError> {
        let mut workspaces = self.workspaces.write().await;
        match workspaces.get_mut(workspace_id) {
            Some(ws) => {
                if !ws.push_version(version) {
                    tracing::warn!(workspace_id = %workspace_id, "version id already present, skipping append");
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Workspace>, StoreError> {
        let workspaces = self.workspaces.read().await;
        let mut owned: Vec<Workspace> = workspaces
            .values()
            .filter(|ws| ws.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }
}
