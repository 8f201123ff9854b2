use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StageError;
use crate::providers::{Orientation, VideoSource};
use crate::workflow::graph::Stage;
use crate::workflow::state::{PipelineState, StateField, StateUpdate};

const CLIP_LIMIT: usize = 5;

pub fn orientation_for(channel: &str) -> Orientation {
    match channel.to_ascii_lowercase().as_str() {
        "tiktok" | "stories" | "reels" => Orientation::Portrait,
        "instagram" => Orientation::Square,
        _ => Orientation::Landscape,
    }
}

/// Picks stock footage matching the brief's visual direction
pub struct VideoGeneration {
    source: Arc<dyn VideoSource>,
}

impl VideoGeneration {
    pub fn new(source: Arc<dyn VideoSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for VideoGeneration {
    async fn execute(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let brief = state
            .campaign_brief
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("campaign brief is required".to_string()))?;

        let query = if brief.visual_direction.trim().is_empty() {
            state.input.brand_name.clone()
        } else {
            brief.visual_direction.clone()
        };
        let orientation = orientation_for(state.input.channel_or_default());

        let mut clips = self.source.search_clips(&query, orientation, CLIP_LIMIT).await?;
        if clips.is_empty() {
            return Err(StageError::InvalidUpstreamResponse(format!(
                "no stock clips found for '{}'",
                query
            )));
        }

        // Longest clip leads
        clips.sort_by(|a, b| b.duration_seconds.cmp(&a.duration_seconds));
        let video_url = clips[0].url.clone();

        tracing::info!(clips = clips.len(), orientation = orientation.as_str(), "🎬 Selected campaign video");
        Ok(StateUpdate::new().with_video(video_url, clips))
    }

    fn outputs(&self) -> &'static [StateField] {
        &[StateField::VideoUrl, StateField::VideoClips]
    }
}
