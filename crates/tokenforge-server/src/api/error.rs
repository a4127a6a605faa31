//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use tokenforge_core::TokenError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The presented token was rejected by the engine
    #[error("Token rejected: {0}")]
    Rejected(TokenError),

    /// The engine refused an issuance request
    #[error("Issuance refused: {0}")]
    Refused(TokenError),

    /// Remote key material could not be fetched
    #[error("Upstream failure: {0}")]
    Upstream(TokenError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Map an engine error raised while verifying a presented token
    pub fn verification(err: TokenError) -> Self {
        match err {
            TokenError::RemoteFetchFailure(_) => ApiError::Upstream(err),
            err if err.is_rejection() => ApiError::Rejected(err),
            err => ApiError::Internal(err.to_string()),
        }
    }

    /// Map an engine error raised while issuing a token
    pub fn issuance(err: TokenError) -> Self {
        match err {
            TokenError::Crypto(_) | TokenError::InvalidKey(_) | TokenError::KeyNotFound(_) => {
                ApiError::Internal(err.to_string())
            }
            err => ApiError::Refused(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Rejected(err) => (StatusCode::UNAUTHORIZED, err.code(), err.to_string()),
            ApiError::Refused(err) => (StatusCode::BAD_REQUEST, err.code(), err.to_string()),
            ApiError::Upstream(err) => {
                warn!(error = %err, "Remote key material unavailable");
                (StatusCode::BAD_GATEWAY, err.code(), err.to_string())
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_mapping() {
        let cases = [
            (TokenError::SignatureInvalid, StatusCode::UNAUTHORIZED),
            (TokenError::TokenExpired(1), StatusCode::UNAUTHORIZED),
            (TokenError::TokenNotYetValid(1), StatusCode::UNAUTHORIZED),
            (TokenError::MalformedToken("x".into()), StatusCode::UNAUTHORIZED),
            (TokenError::AlgorithmNotAllowed("none".into()), StatusCode::UNAUTHORIZED),
            (TokenError::UnsupportedAlgorithm("ES256".into()), StatusCode::UNAUTHORIZED),
            (TokenError::UnknownKeyId("k".into()), StatusCode::UNAUTHORIZED),
            (TokenError::KeyNotFound("k".into()), StatusCode::UNAUTHORIZED),
            (TokenError::RemoteFetchFailure("u".into()), StatusCode::BAD_GATEWAY),
            (TokenError::Crypto("c".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::verification(err).into_response().status(), status, "{}", label);
        }
    }

    #[test]
    fn test_issuance_mapping() {
        assert_eq!(
            ApiError::issuance(TokenError::Config("ttl".into())).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::issuance(TokenError::AlgorithmNotAllowed("none".into()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::issuance(TokenError::KeyNotFound("private.pem".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
