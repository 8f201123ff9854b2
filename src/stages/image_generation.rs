use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StageError;
use crate::providers::ImageModel;
use crate::workflow::graph::Stage;
use crate::workflow::state::{AdImage, PipelineState, StateField, StateUpdate};

/// Aspect ratio that fits the placement of a channel
pub fn aspect_ratio_for(channel: &str) -> &'static str {
    match channel.to_ascii_lowercase().as_str() {
        "instagram" => "1:1",
        "tiktok" | "stories" | "reels" => "9:16",
        _ => "16:9",
    }
}

/// Renders one ad image per creative prompt
pub struct ImageGeneration {
    model: Arc<dyn ImageModel>,
}

impl ImageGeneration {
    pub fn new(model: Arc<dyn ImageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for ImageGeneration {
    async fn execute(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let prompts = state
            .creative_prompts
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StageError::MissingInput("creative prompts are required".to_string()))?;

        let aspect_ratio = aspect_ratio_for(state.input.channel_or_default());
        let mut images = Vec::with_capacity(prompts.len());

        // Sequential on purpose: image APIs rate limit per key
        for (i, prompt) in prompts.iter().enumerate() {
            tracing::info!("🎨 Generating ad image {}/{} ({})", i + 1, prompts.len(), aspect_ratio);
            let image = self.model.generate_image(&prompt.image_prompt, aspect_ratio).await?;
            images.push(AdImage {
                url: image.url,
                mime_type: image.mime_type,
                headline: prompt.headline.clone(),
                caption: prompt.caption.clone(),
            });
        }

        Ok(StateUpdate::new().with_ad_images(images))
    }

    fn outputs(&self) -> &'static [StateField] {
        &[StateField::AdImages]
    }
}
