use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;
use crate::providers::TextModel;

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
pub struct ClaudeRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub id: String,
    pub content: Vec<ResponseContent>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_content(&self, request: &ClaudeRequest) -> Result<ClaudeResponse, ProviderError> {
        // Configure exponential backoff for retries
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(300)),
            ..Default::default()
        };

        // Retry transient errors (connection, timeout, 429, 5xx); everything else fails fast
        let operation = || async {
            let response = self
                .client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .timeout(Duration::from_secs(120))
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("Claude API connection error (retrying): {}", e);
                        backoff::Error::transient(ProviderError::Http(e))
                    } else {
                        tracing::error!("Claude API permanent error: {}", e);
                        backoff::Error::permanent(ProviderError::Http(e))
                    }
                })?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(ProviderError::Http(e)))?;

            if matches!(status.as_u16(), 429 | 500 | 502 | 503 | 529) {
                tracing::warn!("Claude API returned {} (retrying)", status);
                return Err(backoff::Error::transient(ProviderError::Api {
                    status: status.as_u16(),
                    body: response_text,
                }));
            }

            if !status.is_success() {
                tracing::error!("Claude API permanent error ({}): {}", status, response_text);
                return Err(backoff::Error::permanent(ProviderError::Api {
                    status: status.as_u16(),
                    body: response_text,
                }));
            }

            serde_json::from_str::<ClaudeResponse>(&response_text).map_err(|e| {
                backoff::Error::permanent(ProviderError::Decode(format!(
                    "Failed to parse Claude response: {}",
                    e
                )))
            })
        };

        retry(backoff_config, operation).await
    }

    pub async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: 4096,
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: if system.is_empty() { None } else { Some(system.to_string()) },
            temperature: Some(0.7),
        };

        let response = self.generate_content(&request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                "Claude usage: {} input + {} output tokens",
                usage.input_tokens,
                usage.output_tokens
            );
        }

        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseContent::Text { text } => Some(text),
                ResponseContent::Other => None,
            })
            .ok_or_else(|| ProviderError::Decode("No text content in Claude response".to_string()))
    }
}

#[async_trait]
impl TextModel for ClaudeClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        self.generate_text(system, prompt).await
    }
}
