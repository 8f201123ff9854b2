use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workspaces::Workspace;

/// Workspace metadata plus the outputs of its current version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub id: String,
    pub name: String,
    pub brand_name: String,
    pub inputs: Map<String, Value>,
    pub current_version_id: Option<String>,
    pub version_count: usize,
    pub current_outputs: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Workspace> for WorkspaceView {
    fn from(ws: Workspace) -> Self {
        let current_outputs = ws.current_version().map(|v| v.outputs.clone());
        Self {
            version_count: ws.versions.len(),
            current_outputs,
            id: ws.id,
            name: ws.name,
            brand_name: ws.brand_name,
            inputs: ws.inputs,
            current_version_id: ws.current_version_id,
            created_at: ws.created_at,
            updated_at: ws.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: String,
    pub name: String,
    pub brand_name: String,
    pub current_version_id: Option<String>,
    pub version_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<Workspace> for WorkspaceSummary {
    fn from(ws: Workspace) -> Self {
        Self {
            version_count: ws.versions.len(),
            id: ws.id,
            name: ws.name,
            brand_name: ws.brand_name,
            current_version_id: ws.current_version_id,
            updated_at: ws.updated_at,
        }
    }
}
