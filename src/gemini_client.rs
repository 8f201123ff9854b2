use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::providers::{GeneratedImage, ImageModel};

const IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini image generation. Generated images are written under `output_dir` and
/// referenced as `/outputs/<file>`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    output_dir: PathBuf,
}

impl GeminiClient {
    pub fn new(api_key: String, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            output_dir: output_dir.into(),
        }
    }

    pub async fn generate_image_bytes(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<(Vec<u8>, String), ProviderError> {
        let request = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }],
                "role": "user"
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": aspect_ratio }
            }
        });

        let url = format!("{}/models/{}:generateContent", self.base_url, IMAGE_MODEL);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let response_json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Decode(format!("Gemini response is not JSON: {}", e)))?;

        // Extract base64 image from the first candidate
        let parts = response_json["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        for part in parts {
            if let Some(inline_data) = part.get("inlineData") {
                if let Some(data) = inline_data["data"].as_str() {
                    let mime_type = inline_data["mimeType"].as_str().unwrap_or("image/png").to_string();
                    let image_bytes = BASE64_STANDARD
                        .decode(data)
                        .map_err(|e| ProviderError::Decode(format!("Failed to decode base64 image: {}", e)))?;
                    return Ok((image_bytes, mime_type));
                }
            }
        }

        Err(ProviderError::Decode("No image data found in Gemini response".to_string()))
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError> {
        let (bytes, mime_type) = self.generate_image_bytes(prompt, aspect_ratio).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(&mime_type));
        tokio::fs::write(self.output_dir.join(&file_name), &bytes).await?;

        tracing::info!("🖼️ Generated image {} ({} bytes)", file_name, bytes.len());

        Ok(GeneratedImage {
            url: format!("/outputs/{}", file_name),
            mime_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_mime_type() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("application/octet-stream"), "png");
    }
}
