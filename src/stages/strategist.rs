use async_trait::async_trait;
use std::sync::Arc;

use super::describe_input;
use crate::error::StageError;
use crate::providers::{parse_structured, TextModel};
use crate::workflow::graph::Stage;
use crate::workflow::state::{CampaignBrief, PipelineState, StateField, StateUpdate};

const SYSTEM_PROMPT: &str = "You are a senior brand strategist. Respond with a single JSON object \
with the keys summary, targetAudience, keyMessages (array of strings), valueProposition and \
visualDirection. Do not add any other text.";

/// Produces the campaign brief every later stage builds on
pub struct Strategist {
    model: Arc<dyn TextModel>,
}

impl Strategist {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for Strategist {
    async fn execute(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let brand = state.input.brand_name.trim();
        if brand.is_empty() {
            return Err(StageError::MissingInput("brand name is required".to_string()));
        }

        let prompt = format!(
            "Write a campaign brief for the following brand.\n\n{}",
            describe_input(&state.input)
        );
        let raw = self.model.complete(SYSTEM_PROMPT, &prompt).await?;
        let brief: CampaignBrief = parse_structured(&raw)?;

        if brief.summary.trim().is_empty() {
            return Err(StageError::InvalidUpstreamResponse(
                "campaign brief has an empty summary".to_string(),
            ));
        }

        tracing::info!(brand, messages = brief.key_messages.len(), "🧭 Campaign brief ready");
        Ok(StateUpdate::new().with_campaign_brief(brief))
    }

    fn outputs(&self) -> &'static [StateField] {
        &[StateField::CampaignBrief]
    }
}
