//! Pipeline stages. Each one reads the shared state, talks to at most one
//! provider, and returns only the fields it owns.

pub mod creative_prompts;
pub mod image_generation;
pub mod strategist;
pub mod video_generation;

pub use creative_prompts::CreativePromptBuilder;
pub use image_generation::ImageGeneration;
pub use strategist::Strategist;
pub use video_generation::VideoGeneration;

pub const STRATEGIST: &str = "strategist";
pub const CREATIVE_PROMPT_BUILDER: &str = "creative_prompt_builder";
pub const IMAGE_GENERATION: &str = "image_generation";
pub const VIDEO_GENERATION: &str = "video_generation";

/// Append the optional campaign fields to a prompt, skipping the ones not given
pub(crate) fn describe_input(input: &crate::workflow::state::CampaignInput) -> String {
    let mut lines = vec![format!("Brand: {}", input.brand_name)];
    let optional = [
        ("Campaign goal", &input.campaign_goal),
        ("Channel", &input.channel),
        ("Target audience", &input.target_audience),
        ("Tone", &input.tone),
        ("Product", &input.product_description),
        ("Website", &input.website),
    ];
    for (label, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            lines.push(format!("{}: {}", label, value));
        }
    }
    lines.join("\n")
}
