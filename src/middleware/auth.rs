use crate::handlers::error::ApiError;
use crate::models::auth::{Claims, OwnerId};
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

/// HMAC keys for issuing and verifying bearer tokens
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, owner_id: &str, valid_for: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: owner_id.to_string(),
            exp: (now + valid_for).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(token_data.claims)
    }
}

pub async fn auth_middleware(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract the Authorization header
    let auth_str = headers
        .get("Authorization")
        .ok_or_else(|| ApiError::Unauthenticated("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("Invalid Authorization header format".to_string()))?;

    // Extract token from "Bearer <token>" format
    let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthenticated("Invalid Authorization header format. Expected 'Bearer <token>'".to_string())
    })?;

    let claims = state.jwt.verify_token(token).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        ApiError::Unauthenticated("Invalid or expired token".to_string())
    })?;

    if claims.sub.trim().is_empty() {
        return Err(ApiError::Unauthenticated("Token carries no owner".to_string()));
    }

    // Handlers read the owner through the OwnerId extractor
    request.extensions_mut().insert(OwnerId(claims.sub.clone()));
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OwnerId>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated("No owner identity presented".to_string()))
    }
}
