// Assembler - turns a finished PipelineState into the job's result or error
use serde::{Deserialize, Serialize};

use super::state::{AdImage, CampaignBrief, CreativePrompt, PipelineMode, PipelineState};
use crate::providers::VideoClip;

/// Payload stored as the job result and as the workspace version outputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResult {
    pub mode: PipelineMode,
    pub brand_name: String,
    pub campaign_brief: CampaignBrief,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creative_prompts: Vec<CreativePrompt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ad_images: Vec<AdImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video_clips: Vec<VideoClip>,
    pub completed_stages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success(CampaignResult),
    Failure(String),
}

fn missing(field: &str) -> PipelineOutcome {
    PipelineOutcome::Failure(format!("pipeline finished without producing {}", field))
}

/// Success only when every output the mode promises is present
pub fn assemble(state: &PipelineState) -> PipelineOutcome {
    if let Some(failure) = &state.error {
        return PipelineOutcome::Failure(failure.to_string());
    }

    let Some(brief) = state.campaign_brief.clone() else {
        return missing("a campaign brief");
    };

    let mut result = CampaignResult {
        mode: state.mode,
        brand_name: state.input.brand_name.clone(),
        campaign_brief: brief,
        creative_prompts: Vec::new(),
        ad_images: Vec::new(),
        video_url: None,
        video_clips: Vec::new(),
        completed_stages: state.completed_nodes.clone(),
    };

    if state.mode == PipelineMode::BrandAnalysis {
        return PipelineOutcome::Success(result);
    }

    match (&state.creative_prompts, &state.ad_images) {
        (Some(prompts), Some(images)) if !images.is_empty() => {
            result.creative_prompts = prompts.clone();
            result.ad_images = images.clone();
        }
        _ => return missing("ad images"),
    }

    if state.mode == PipelineMode::Video {
        match &state.video_url {
            Some(url) => {
                result.video_url = Some(url.clone());
                result.video_clips = state.video_clips.clone().unwrap_or_default();
            }
            None => return missing("a video"),
        }
    }

    PipelineOutcome::Success(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::workflow::state::{CampaignInput, StateUpdate};

    fn brief() -> CampaignBrief {
        CampaignBrief {
            summary: "s".to_string(),
            target_audience: "a".to_string(),
            key_messages: vec![],
            value_proposition: "v".to_string(),
            visual_direction: "d".to_string(),
        }
    }

    fn image() -> AdImage {
        AdImage {
            url: "/outputs/1.png".to_string(),
            mime_type: "image/png".to_string(),
            headline: "h".to_string(),
            caption: "c".to_string(),
        }
    }

    #[test]
    fn test_failure_carries_stage_and_kind() {
        let mut state = PipelineState::new("j", CampaignInput::new("Acme"), PipelineMode::Video);
        state.record_failure("image_generation", &StageError::UpstreamProvider("quota exceeded".to_string()));

        assert_eq!(
            assemble(&state),
            PipelineOutcome::Failure("provider failure in stage 'image_generation': quota exceeded".to_string())
        );
    }

    #[test]
    fn test_poster_success_includes_images_only() {
        let mut state = PipelineState::new("j", CampaignInput::new("Acme"), PipelineMode::Poster);
        state.apply_update(
            StateUpdate::new()
                .with_campaign_brief(brief())
                .with_creative_prompts(vec![])
                .with_ad_images(vec![image()]),
        );

        let PipelineOutcome::Success(result) = assemble(&state) else {
            panic!("expected success");
        };
        assert_eq!(result.ad_images, vec![image()]);
        assert!(result.video_url.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["adImages"][0]["url"], "/outputs/1.png");
        assert!(json.get("videoUrl").is_none());
    }

    #[test]
    fn test_video_mode_requires_video() {
        let mut state = PipelineState::new("j", CampaignInput::new("Acme"), PipelineMode::Video);
        state.apply_update(
            StateUpdate::new()
                .with_campaign_brief(brief())
                .with_creative_prompts(vec![])
                .with_ad_images(vec![image()]),
        );
        assert_eq!(assemble(&state), missing("a video"));
    }

    #[test]
    fn test_brand_analysis_needs_only_brief() {
        let mut state = PipelineState::new("j", CampaignInput::new("Acme"), PipelineMode::BrandAnalysis);
        assert_eq!(assemble(&state), missing("a campaign brief"));

        state.apply_update(StateUpdate::new().with_campaign_brief(brief()));
        assert!(matches!(assemble(&state), PipelineOutcome::Success(_)));
    }
}
