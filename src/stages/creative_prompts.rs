use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StageError;
use crate::providers::{parse_structured, TextModel};
use crate::workflow::graph::Stage;
use crate::workflow::state::{CreativePrompt, PipelineState, StateField, StateUpdate};

const SYSTEM_PROMPT: &str = "You are an advertising art director. Respond with a JSON array of \
objects with the keys headline, imagePrompt and caption. imagePrompt must describe a single \
photographic ad visual without any text in the image.";

/// Turns the brief into one prompt per ad visual
pub struct CreativePromptBuilder {
    model: Arc<dyn TextModel>,
    max_prompts: usize,
}

impl CreativePromptBuilder {
    pub fn new(model: Arc<dyn TextModel>, max_prompts: usize) -> Self {
        Self {
            model,
            max_prompts: max_prompts.max(1),
        }
    }
}

#[async_trait]
impl Stage for CreativePromptBuilder {
    async fn execute(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let brief = state
            .campaign_brief
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("campaign brief is required".to_string()))?;

        let prompt = format!(
            "Brand: {}\nChannel: {}\nSummary: {}\nAudience: {}\nKey messages: {}\nVisual direction: {}\n\n\
             Write {} distinct ad concepts.",
            state.input.brand_name,
            state.input.channel_or_default(),
            brief.summary,
            brief.target_audience,
            brief.key_messages.join("; "),
            brief.visual_direction,
            self.max_prompts,
        );

        let raw = self.model.complete(SYSTEM_PROMPT, &prompt).await?;
        let mut prompts: Vec<CreativePrompt> = parse_structured(&raw)?;
        prompts.retain(|p| !p.image_prompt.trim().is_empty());
        prompts.truncate(self.max_prompts);

        if prompts.is_empty() {
            return Err(StageError::InvalidUpstreamResponse(
                "model returned no usable creative prompts".to_string(),
            ));
        }

        tracing::info!(count = prompts.len(), "✍️ Creative prompts ready");
        Ok(StateUpdate::new().with_creative_prompts(prompts))
    }

    fn outputs(&self) -> &'static [StateField] {
        &[StateField::CreativePrompts]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageErrorKind;
    use crate::providers::parse_structured;
    use crate::providers::testing::{ScriptedTextModel, BRIEF_JSON, PROMPTS_JSON};
    use crate::workflow::state::{CampaignInput, PipelineMode};

    fn briefed_state() -> PipelineState {
        let mut state = PipelineState::new("job", CampaignInput::new("Acme"), PipelineMode::Video);
        state.apply_update(StateUpdate::new().with_campaign_brief(parse_structured(BRIEF_JSON).unwrap()));
        state
    }

    #[tokio::test]
    async fn test_requires_brief() {
        let model = Arc::new(ScriptedTextModel::new().reply(PROMPTS_JSON));
        let state = PipelineState::new("job", CampaignInput::new("Acme"), PipelineMode::Video);

        let err = CreativePromptBuilder::new(model.clone(), 3).execute(&state).await.unwrap_err();
        assert_eq!(err.kind(), StageErrorKind::MissingRequiredInput);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_caps_prompt_count() {
        let model = Arc::new(ScriptedTextModel::new().reply(PROMPTS_JSON));
        let update = CreativePromptBuilder::new(model, 1)
            .execute(&briefed_state())
            .await
            .unwrap();

        let prompts = update.creative_prompts.unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].headline, "Launch Day");
    }

    #[tokio::test]
    async fn test_empty_array_is_invalid_response() {
        let model = Arc::new(ScriptedTextModel::new().reply("[]"));
        let err = CreativePromptBuilder::new(model, 3)
            .execute(&briefed_state())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StageErrorKind::InvalidUpstreamResponse);
    }
}
