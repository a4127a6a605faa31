//! Token issuance and verification handlers

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use tokenforge_core::{Algorithm, Claims, IssueOptions, TokenEngine};

use crate::api::error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub engine: TokenEngine,
}

/// Request to issue a token
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Caller claims; `iat` and `exp` are overwritten
    #[serde(default)]
    pub claims: Map<String, Value>,

    /// Lifetime in seconds
    #[serde(default)]
    pub ttl: Option<u64>,

    /// Requested algorithm
    #[serde(default)]
    pub alg: Option<String>,
}

/// Response from token issuance
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueResponse {
    pub token: String,

    /// RFC 3339 expiry
    pub expires_at: String,
}

/// Request to verify a token
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// Response from token verification
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub claims: Claims,
}

/// Response from bearer token introspection
#[derive(Debug, Serialize, Deserialize)]
pub struct IntrospectResponse {
    pub sub: String,
    pub claims: Claims,
}

/// Issue a token
///
/// POST /v1/token/issue
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IssueRequest>,
) -> Result<Json<IssueResponse>, ApiError> {
    let mut options = IssueOptions::new();
    if let Some(ttl) = request.ttl {
        options = options.ttl(ttl);
    }
    if let Some(alg) = &request.alg {
        let algorithm: Algorithm = alg.parse().map_err(ApiError::issuance)?;
        options = options.algorithm(algorithm);
    }

    let token = state
        .engine
        .issue(Claims::from(request.claims), &options)
        .map_err(ApiError::issuance)?;

    let exp = state
        .engine
        .decode(&token)
        .and_then(|decoded| decoded.claims.exp())
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::Internal("issued token has no exp".into()))?;
    let expires_at = DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| ApiError::Internal(format!("exp {} out of range", exp)))?
        .to_rfc3339();

    info!(expires_at = %expires_at, "Issued token");

    Ok(Json(IssueResponse { token, expires_at }))
}

/// Verify a token
///
/// POST /v1/token/verify
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let claims = state
        .engine
        .verify(&request.token)
        .await
        .map_err(ApiError::verification)?;

    debug!(sub = ?claims.sub(), "Token verified");

    Ok(Json(VerifyResponse {
        valid: true,
        claims,
    }))
}

/// Verify the bearer token on the request and require a subject
///
/// GET /v1/token/introspect
pub async fn introspect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<IntrospectResponse>, ApiError> {
    let token = bearer_token(&headers)?;

    let claims = state
        .engine
        .verify(token)
        .await
        .map_err(ApiError::verification)?;

    let sub = claims
        .sub()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Token has no subject".into()))?;

    Ok(Json(IntrospectResponse { sub, claims }))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Authorization header is not text".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected a Bearer token".into()))
}
