// src/client.rs
//! HTTP client for the campaign API: start a pipeline, then poll its job.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::models::auth::ErrorResponse;
use crate::models::campaign::{StartCampaignRequest, StartCampaignResponse};
use crate::models::job::JobView;
use crate::polling::{PollError, Poller};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct CampaignClient {
    http: Client,
    base_url: String,
    token: String,
}

impl CampaignClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn start_campaign(&self, request: &StartCampaignRequest) -> Result<StartCampaignResponse, ClientError> {
        let url = format!("{}/api/campaigns", self.base_url);
        let response = self.authorized(self.http.post(&url)).json(request).send().await?;
        Self::decode(response).await
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobView, ClientError> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        let response = self.authorized(self.http.get(&url)).send().await?;
        Self::decode(response).await
    }

    /// Poller over one job that stops by itself once the job is terminal.
    /// Nothing is fetched until `start` is called on the returned poller.
    pub fn watch_job(&self, job_id: impl Into<String>, interval: Duration) -> Poller<JobView> {
        let client = self.clone();
        let job_id = job_id.into();
        Poller::new(
            move || {
                let client = client.clone();
                let job_id = job_id.clone();
                async move { client.job_status(&job_id).await.map_err(|e| Box::new(e) as PollError) }
            },
            interval,
            |job: &JobView| job.status.is_terminal(),
        )
    }
}
