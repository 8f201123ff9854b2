use serde::{Deserialize, Serialize};

use crate::workflow::{CampaignInput, PipelineMode};

/// Which full pipeline a campaign request runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignMode {
    #[default]
    Video,
    Poster,
}

impl From<CampaignMode> for PipelineMode {
    fn from(mode: CampaignMode) -> Self {
        match mode {
            CampaignMode::Video => PipelineMode::Video,
            CampaignMode::Poster => PipelineMode::Poster,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCampaignRequest {
    #[serde(flatten)]
    pub input: CampaignInput,
    #[serde(default)]
    pub mode: CampaignMode,
    /// Regenerate into an existing workspace instead of creating one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartCampaignResponse {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}
