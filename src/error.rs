// src/error.rs
//! Error types shared across stores, providers, and pipeline stages

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a job or workspace backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to an external AI or content provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup or capability configuration problem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    MissingCapability(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Which of the three stage failure classes occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    MissingRequiredInput,
    UpstreamProvider,
    InvalidUpstreamResponse,
}

impl StageErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            StageErrorKind::MissingRequiredInput => "invalid input",
            StageErrorKind::UpstreamProvider => "provider failure",
            StageErrorKind::InvalidUpstreamResponse => "invalid provider response",
        }
    }
}

/// Functional failure reported by a pipeline stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid input: {0}")]
    MissingInput(String),
    #[error("provider failure: {0}")]
    UpstreamProvider(String),
    #[error("invalid provider response: {0}")]
    InvalidUpstreamResponse(String),
}

impl StageError {
    pub fn kind(&self) -> StageErrorKind {
        match self {
            StageError::MissingInput(_) => StageErrorKind::MissingRequiredInput,
            StageError::UpstreamProvider(_) => StageErrorKind::UpstreamProvider,
            StageError::InvalidUpstreamResponse(_) => StageErrorKind::InvalidUpstreamResponse,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StageError::MissingInput(m)
            | StageError::UpstreamProvider(m)
            | StageError::InvalidUpstreamResponse(m) => m,
        }
    }
}

impl From<ProviderError> for StageError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Decode(msg) => StageError::InvalidUpstreamResponse(msg),
            other => StageError::UpstreamProvider(other.to_string()),
        }
    }
}
