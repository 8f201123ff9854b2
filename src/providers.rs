// src/providers.rs
//! Interfaces to the external AI and content providers used by pipeline stages

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

lazy_static::lazy_static! {
    static ref FENCED_BLOCK: regex::Regex =
        regex::Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid fence regex");
}

/// Text generation (strategy, copywriting)
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Image generation
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError>;
}

/// Stock video clip search
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn search_clips(
        &self,
        query: &str,
        orientation: Orientation,
        limit: usize,
    ) -> Result<Vec<VideoClip>, ProviderError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Where the stored image can be fetched from
    pub url: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoClip {
    pub id: String,
    pub url: String,
    pub preview_image: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: u32,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Square => "square",
        }
    }
}

/// Decode JSON a model returned, tolerating markdown fences and surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, ProviderError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let Some(captures) = FENCED_BLOCK.captures(trimmed) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<T>(body.as_str()) {
                return Ok(value);
            }
        }
    }

    // Fall back to the outermost object or array in the text
    let start = trimmed.find(|c| c == '{' || c == '[');
    let end = trimmed.rfind(|c| c == '}' || c == ']');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            return serde_json::from_str::<T>(&trimmed[start..=end])
                .map_err(|e| ProviderError::Decode(format!("malformed JSON: {}", e)));
        }
    }

    Err(ProviderError::Decode(format!(
        "no JSON found in response: {}",
        trimmed.chars().take(120).collect::<String>()
    )))
}

#[cfg(test)]
pub mod testing {
    //! Scripted provider fakes
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns queued responses in order; errors once the queue is empty.
    #[derive(Default)]
    pub struct ScriptedTextModel {
        responses: Mutex<VecDeque<Result<String, String>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedTextModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: impl Into<String>) -> Self {
            self.responses.lock().unwrap().push_back(Ok(text.into()));
            self
        }

        pub fn fail(self, message: impl Into<String>) -> Self {
            self.responses.lock().unwrap().push_back(Err(message.into()));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextModel for ScriptedTextModel {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(body)) => Err(ProviderError::Api { status: 503, body }),
                None => Err(ProviderError::Api {
                    status: 500,
                    body: "no scripted response left".to_string(),
                }),
            }
        }
    }

    pub struct FakeImageModel {
        pub fail_with: Option<String>,
        pub calls: AtomicUsize,
        pub aspect_ratios: Mutex<Vec<String>>,
    }

    impl FakeImageModel {
        pub fn new() -> Self {
            Self {
                fail_with: None,
                calls: AtomicUsize::new(0),
                aspect_ratios: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                fail_with: Some(message.into()),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ImageModel for FakeImageModel {
        async fn generate_image(&self, _prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.aspect_ratios.lock().unwrap().push(aspect_ratio.to_string());
            if let Some(message) = &self.fail_with {
                return Err(ProviderError::Api {
                    status: 503,
                    body: message.clone(),
                });
            }
            Ok(GeneratedImage {
                url: format!("/outputs/ad-{}.png", n),
                mime_type: "image/png".to_string(),
            })
        }
    }

    pub struct FakeVideoSource {
        pub clips: Vec<VideoClip>,
        pub calls: AtomicUsize,
    }

    impl FakeVideoSource {
        pub fn with_clips(count: usize) -> Self {
            let clips = (0..count)
                .map(|i| VideoClip {
                    id: format!("clip-{}", i),
                    url: format!("https://videos.example.com/clip-{}.mp4", i),
                    preview_image: None,
                    width: Some(1920),
                    height: Some(1080),
                    duration_seconds: 10 + i as u32,
                    author: None,
                })
                .collect();
            Self {
                clips,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VideoSource for FakeVideoSource {
        async fn search_clips(
            &self,
            _query: &str,
            _orientation: Orientation,
            limit: usize,
        ) -> Result<Vec<VideoClip>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.clips.iter().take(limit).cloned().collect())
        }
    }

    pub const BRIEF_JSON: &str = r#"{
        "summary": "Make Acme the first name in rockets",
        "targetAudience": "Coyotes with ambitious plans",
        "keyMessages": ["Reliable", "Fast"],
        "valueProposition": "Gear that actually works",
        "visualDirection": "desert sunrise, bold red"
    }"#;

    pub const PROMPTS_JSON: &str = r#"```json
    [
        {"headline": "Launch Day", "imagePrompt": "rocket over canyon", "caption": "Go further"},
        {"headline": "Built Tough", "imagePrompt": "anvil on a cliff", "caption": "Drop-tested"}
    ]
    ```"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Sample = parse_structured(r#"{"name": "acme"}"#).unwrap();
        assert_eq!(parsed.name, "acme");
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let raw = "Here is the brief:\n```json\n{\"name\": \"acme\"}\n```\nLet me know!";
        let parsed: Sample = parse_structured(raw).unwrap();
        assert_eq!(parsed.name, "acme");
    }

    #[test]
    fn test_parse_embedded_object() {
        let raw = "Sure thing. {\"name\": \"acme\"} Hope that helps.";
        let parsed: Sample = parse_structured(raw).unwrap();
        assert_eq!(parsed.name, "acme");
    }

    #[test]
    fn test_parse_rejects_prose_only() {
        let err = parse_structured::<Sample>("I cannot help with that.").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
