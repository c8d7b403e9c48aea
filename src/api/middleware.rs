//! API-key authentication and the acting-participant extractor.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::CoreError;

/// Header carrying the participant on whose behalf a request acts.
pub const ACTOR_HEADER: &str = "X-Participant-Id";

/// Security configuration for the HTTP surface.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Bearer token required on protected routes
    pub api_key: Option<String>,
    /// Allowed CORS origins; any origin when unset
    pub cors_origins: Option<Vec<String>>,
}

impl SecurityConfig {
    /// No authentication (local development and tests).
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            cors_origins: None,
        }
    }
}

/// Reject requests without the configured bearer token.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected_key = match &config.api_key {
        Some(key) => key,
        None => return Ok(next.run(request).await),
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == expected_key => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// The participant performing a request, taken from [`ACTOR_HEADER`].
///
/// Identity is established upstream; this layer only parses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| {
                CoreError::InvalidParameter(format!("Missing {} header", ACTOR_HEADER))
            })?
            .to_str()
            .map_err(|_| CoreError::InvalidParameter(format!("Malformed {} header", ACTOR_HEADER)))?;

        Uuid::parse_str(value.trim())
            .map(Actor)
            .map_err(|_| CoreError::InvalidParameter(format!("Malformed {} header", ACTOR_HEADER)))
    }
}
