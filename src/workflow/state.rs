// PipelineState - the record threaded through the campaign workflow
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StageError, StageErrorKind};
use crate::providers::VideoClip;

/// Validated campaign/brand parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignInput {
    pub brand_name: String,
    pub campaign_goal: Option<String>,
    pub channel: Option<String>,
    pub target_audience: Option<String>,
    pub tone: Option<String>,
    pub product_description: Option<String>,
    pub website: Option<String>,
}

impl CampaignInput {
    pub fn new(brand_name: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
            ..Self::default()
        }
    }

    pub fn channel_or_default(&self) -> &str {
        self.channel.as_deref().unwrap_or("social")
    }
}

/// Which stages a run goes through
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Strategy, prompts, images, and stock video
    #[default]
    Video,
    /// Strategy, prompts, and images only
    Poster,
    /// Strategy only
    BrandAnalysis,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Video => "video",
            PipelineMode::Poster => "poster",
            PipelineMode::BrandAnalysis => "brand_analysis",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBrief {
    pub summary: String,
    pub target_audience: String,
    #[serde(default)]
    pub key_messages: Vec<String>,
    pub value_proposition: String,
    pub visual_direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreativePrompt {
    pub headline: String,
    pub image_prompt: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdImage {
    pub url: String,
    pub mime_type: String,
    pub headline: String,
    pub caption: String,
}

/// Stage-owned output fields of the pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    CampaignBrief,
    CreativePrompts,
    AdImages,
    VideoUrl,
    VideoClips,
}

/// Why a run stopped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageFailure {
    pub stage: String,
    pub kind: StageErrorKind,
    pub message: String,
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in stage '{}': {}", self.kind.label(), self.stage, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub job_id: String,
    pub input: CampaignInput,
    pub mode: PipelineMode,

    /// Node currently executing (or last executed)
    pub current_node: Option<String>,
    pub completed_nodes: Vec<String>,

    pub campaign_brief: Option<CampaignBrief>,
    pub creative_prompts: Option<Vec<CreativePrompt>>,
    pub ad_images: Option<Vec<AdImage>>,
    pub video_url: Option<String>,
    pub video_clips: Option<Vec<VideoClip>>,

    pub error: Option<StageFailure>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new(job_id: impl Into<String>, input: CampaignInput, mode: PipelineMode) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            input,
            mode,
            current_node: None,
            completed_nodes: Vec::new(),
            campaign_brief: None,
            creative_prompts: None,
            ad_images: None,
            video_url: None,
            video_clips: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Shallow merge: fields present in the update replace ours, everything else stays.
    pub fn apply_update(&mut self, update: StateUpdate) {
        self.updated_at = Utc::now();

        if let Some(brief) = update.campaign_brief {
            self.campaign_brief = Some(brief);
        }
        if let Some(prompts) = update.creative_prompts {
            self.creative_prompts = Some(prompts);
        }
        if let Some(images) = update.ad_images {
            self.ad_images = Some(images);
        }
        if let Some(url) = update.video_url {
            self.video_url = Some(url);
        }
        if let Some(clips) = update.video_clips {
            self.video_clips = Some(clips);
        }
    }

    /// The first failure wins; later ones never replace it.
    pub fn record_failure(&mut self, stage: &str, error: &StageError) {
        if self.error.is_some() {
            return;
        }
        self.updated_at = Utc::now();
        self.error = Some(StageFailure {
            stage: stage.to_string(),
            kind: error.kind(),
            message: error.message().to_string(),
        });
    }

    pub fn set_current_node(&mut self, node: &str) {
        self.current_node = Some(node.to_string());
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, node: &str) {
        self.completed_nodes.push(node.to_string());
    }
}

/// Partial output of one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub campaign_brief: Option<CampaignBrief>,
    pub creative_prompts: Option<Vec<CreativePrompt>>,
    pub ad_images: Option<Vec<AdImage>>,
    pub video_url: Option<String>,
    pub video_clips: Option<Vec<VideoClip>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_campaign_brief(mut self, brief: CampaignBrief) -> Self {
        self.campaign_brief = Some(brief);
        self
    }

    pub fn with_creative_prompts(mut self, prompts: Vec<CreativePrompt>) -> Self {
        self.creative_prompts = Some(prompts);
        self
    }

    pub fn with_ad_images(mut self, images: Vec<AdImage>) -> Self {
        self.ad_images = Some(images);
        self
    }

    pub fn with_video(mut self, url: String, clips: Vec<VideoClip>) -> Self {
        self.video_url = Some(url);
        self.video_clips = Some(clips);
        self
    }

    pub fn touched_fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        if self.campaign_brief.is_some() {
            fields.push(StateField::CampaignBrief);
        }
        if self.creative_prompts.is_some() {
            fields.push(StateField::CreativePrompts);
        }
        if self.ad_images.is_some() {
            fields.push(StateField::AdImages);
        }
        if self.video_url.is_some() {
            fields.push(StateField::VideoUrl);
        }
        if self.video_clips.is_some() {
            fields.push(StateField::VideoClips);
        }
        fields
    }

    /// Drop every field not in `owned`. Returns the dropped fields.
    pub fn retain_owned(&mut self, owned: &[StateField]) -> Vec<StateField> {
        let dropped: Vec<StateField> = self
            .touched_fields()
            .into_iter()
            .filter(|field| !owned.contains(field))
            .collect();

        for field in &dropped {
            match field {
                StateField::CampaignBrief => self.campaign_brief = None,
                StateField::CreativePrompts => self.creative_prompts = None,
                StateField::AdImages => self.ad_images = None,
                StateField::VideoUrl => self.video_url = None,
                StateField::VideoClips => self.video_clips = None,
            }
        }
        dropped
    }
}
