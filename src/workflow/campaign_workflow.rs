// Campaign workflow - wires the stages into a graph per pipeline mode
use std::sync::Arc;

use super::executor::{ExecutorBuilder, ExecutorConfig, WorkflowExecutor};
use super::graph::{StateGraph, StateGraphBuilder};
use super::router::mode_router;
use super::state::PipelineMode;
use crate::error::ConfigError;
use crate::providers::{ImageModel, TextModel, VideoSource};
use crate::stages::{
    CreativePromptBuilder, ImageGeneration, Strategist, VideoGeneration, CREATIVE_PROMPT_BUILDER,
    IMAGE_GENERATION, STRATEGIST, VIDEO_GENERATION,
};

/// Configured providers, and the executors that can be built from them
#[derive(Clone, Default)]
pub struct CampaignWorkflows {
    pub text: Option<Arc<dyn TextModel>>,
    pub images: Option<Arc<dyn ImageModel>>,
    pub video: Option<Arc<dyn VideoSource>>,
    pub max_ad_images: usize,
    pub executor_config: ExecutorConfig,
}

impl CampaignWorkflows {
    pub fn new(max_ad_images: usize) -> Self {
        Self {
            max_ad_images,
            ..Self::default()
        }
    }

    pub fn with_text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text = Some(model);
        self
    }

    pub fn with_image_model(mut self, model: Arc<dyn ImageModel>) -> Self {
        self.images = Some(model);
        self
    }

    pub fn with_video_source(mut self, source: Arc<dyn VideoSource>) -> Self {
        self.video = Some(source);
        self
    }

    pub fn has_text_model(&self) -> bool {
        self.text.is_some()
    }

    pub fn has_image_model(&self) -> bool {
        self.images.is_some()
    }

    pub fn has_video_source(&self) -> bool {
        self.video.is_some()
    }

    /// Check that every provider `mode` needs is configured
    pub fn ensure_available(&self, mode: PipelineMode) -> Result<(), ConfigError> {
        self.build_graph(mode).map(|_| ())
    }

    /// Build a fresh executor for one run. Fails when a provider the mode needs
    /// is not configured.
    pub fn executor_for(&self, mode: PipelineMode) -> Result<WorkflowExecutor, ConfigError> {
        let graph = self.build_graph(mode)?;
        ExecutorBuilder::new()
            .with_graph(graph)
            .with_config(self.executor_config.clone())
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "workflow",
                value: e,
            })
    }

    fn build_graph(&self, mode: PipelineMode) -> Result<StateGraph, ConfigError> {
        let text = self
            .text
            .clone()
            .ok_or(ConfigError::MissingCapability("text generation (ANTHROPIC_API_KEY)"))?;

        let builder = StateGraphBuilder::new()
            .add_node(
                STRATEGIST,
                Arc::new(Strategist::new(text.clone())),
                "Draft the campaign brief",
            )
            .set_entry_point(STRATEGIST);

        let builder = if mode == PipelineMode::BrandAnalysis {
            builder
        } else {
            let images = self
                .images
                .clone()
                .ok_or(ConfigError::MissingCapability("image generation (GEMINI_API_KEY)"))?;

            let builder = builder
                .add_node(
                    CREATIVE_PROMPT_BUILDER,
                    Arc::new(CreativePromptBuilder::new(text, self.max_ad_images)),
                    "Write creative prompts",
                )
                .add_node(
                    IMAGE_GENERATION,
                    Arc::new(ImageGeneration::new(images)),
                    "Render ad images",
                )
                .add_edge(STRATEGIST, CREATIVE_PROMPT_BUILDER)
                .add_edge(CREATIVE_PROMPT_BUILDER, IMAGE_GENERATION);

            if mode == PipelineMode::Video {
                let video = self
                    .video
                    .clone()
                    .ok_or(ConfigError::MissingCapability("stock video (PEXELS_API_KEY)"))?;
                builder
                    .add_node(
                        VIDEO_GENERATION,
                        Arc::new(VideoGeneration::new(video)),
                        "Select campaign video",
                    )
                    .add_conditional_edge(
                        IMAGE_GENERATION,
                        mode_router(VIDEO_GENERATION, &[PipelineMode::Video]),
                    )
            } else {
                builder
            }
        };

        builder.build().map_err(|e| ConfigError::Invalid {
            key: "workflow",
            value: e,
        })
    }
}
