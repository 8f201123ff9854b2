// src/pexels_client.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::providers::{Orientation, VideoClip, VideoSource};

#[derive(Debug, Clone)]
pub struct PexelsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PexelsVideoResponse {
    pub page: i32,
    pub per_page: i32,
    pub total_results: i32,
    pub videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsVideo {
    pub id: i64,
    pub width: i32,
    pub height: i32,
    pub duration: i32,
    pub image: Option<String>,
    pub user: PexelsUser,
    pub video_files: Vec<PexelsVideoFile>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsVideoFile {
    pub id: i64,
    pub quality: Option<String>,
    pub file_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub link: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PexelsUser {
    pub id: i64,
    pub name: String,
    pub url: String,
}

impl PexelsVideo {
    /// Prefer an HD mp4, then any mp4, then whatever is listed first.
    fn best_file(&self) -> Option<&PexelsVideoFile> {
        self.video_files
            .iter()
            .find(|f| f.file_type == "video/mp4" && f.quality.as_deref() == Some("hd"))
            .or_else(|| self.video_files.iter().find(|f| f.file_type == "video/mp4"))
            .or_else(|| self.video_files.first())
    }

    fn into_clip(self) -> Option<VideoClip> {
        let file = self.best_file()?.clone();
        Some(VideoClip {
            id: self.id.to_string(),
            url: file.link,
            preview_image: self.image,
            width: file.width.map(|w| w.max(0) as u32),
            height: file.height.map(|h| h.max(0) as u32),
            duration_seconds: self.duration.max(0) as u32,
            author: Some(self.user.name),
        })
    }
}

impl PexelsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.pexels.com".to_string(),
        }
    }

    pub async fn search_videos(
        &self,
        query: &str,
        orientation: Orientation,
        per_page: usize,
    ) -> Result<PexelsVideoResponse, ProviderError> {
        let per_page = per_page.clamp(1, 80).to_string();
        let response = self
            .client
            .get(format!("{}/videos/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("orientation", orientation.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("Pexels API error ({}): {}", status, body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<PexelsVideoResponse>()
            .await
            .map_err(|e| ProviderError::Decode(format!("Failed to parse Pexels response: {}", e)))
    }
}

#[async_trait]
impl VideoSource for PexelsClient {
    async fn search_clips(
        &self,
        query: &str,
        orientation: Orientation,
        limit: usize,
    ) -> Result<Vec<VideoClip>, ProviderError> {
        let response = self.search_videos(query, orientation, limit).await?;
        tracing::info!("🎞️ Pexels returned {} of {} videos for '{}'", response.videos.len(), response.total_results, query);
        Ok(response
            .videos
            .into_iter()
            .filter_map(PexelsVideo::into_clip)
            .take(limit)
            .collect())
    }
}
