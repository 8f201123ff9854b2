// src/handlers/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::error::{ConfigError, StoreError};
use crate::models::auth::ErrorResponse;

/// Errors returned synchronously to an HTTP caller
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Store(e) => {
                tracing::error!("Store error while handling request: {}", e);
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}
