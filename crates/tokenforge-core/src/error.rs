//! Error types for the token engine

use thiserror::Error;

/// Result type alias using TokenError
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors that can occur while issuing or verifying tokens
///
/// Every variant is terminal for the call that produced it. The engine never
/// retries or falls back to another key on its own.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Structural decode failure (segment count, base64url, JSON)
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Policy forbids the requested or observed algorithm
    #[error("Algorithm not allowed: {0}")]
    AlgorithmNotAllowed(String),

    /// Algorithm outside the known set
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No matching key for a `kid`
    #[error("Unknown key id: {0}")]
    UnknownKeyId(String),

    /// Named key resource missing
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Signature did not match the resolved key
    #[error("Invalid signature")]
    SignatureInvalid,

    /// `exp` lies in the past
    #[error("Token expired at {0}")]
    TokenExpired(i64),

    /// `iat` lies too far in the future
    #[error("Token issued in the future at {0}")]
    TokenNotYetValid(i64),

    /// Remote key material could not be fetched
    #[error("Remote fetch failed: {0}")]
    RemoteFetchFailure(String),

    /// Key material exists but could not be interpreted
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Signing primitive failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Key material or issuance configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TokenError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::MalformedToken(_) => "MALFORMED_TOKEN",
            TokenError::AlgorithmNotAllowed(_) => "ALGORITHM_NOT_ALLOWED",
            TokenError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            TokenError::UnknownKeyId(_) => "UNKNOWN_KEY_ID",
            TokenError::KeyNotFound(_) => "KEY_NOT_FOUND",
            TokenError::SignatureInvalid => "SIGNATURE_INVALID",
            TokenError::TokenExpired(_) => "TOKEN_EXPIRED",
            TokenError::TokenNotYetValid(_) => "TOKEN_NOT_YET_VALID",
            TokenError::RemoteFetchFailure(_) => "REMOTE_FETCH_FAILURE",
            TokenError::InvalidKey(_) => "INVALID_KEY",
            TokenError::Crypto(_) => "CRYPTO_ERROR",
            TokenError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether this error was caused by the token itself rather than the engine
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            TokenError::RemoteFetchFailure(_) | TokenError::Crypto(_) | TokenError::Config(_)
        )
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::MalformedToken(err.to_string())
    }
}

impl From<base64::DecodeError> for TokenError {
    fn from(err: base64::DecodeError) -> Self {
        TokenError::MalformedToken(format!("invalid base64url: {}", err))
    }
}

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        TokenError::RemoteFetchFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            TokenError::MalformedToken(String::new()),
            TokenError::AlgorithmNotAllowed(String::new()),
            TokenError::UnsupportedAlgorithm(String::new()),
            TokenError::UnknownKeyId(String::new()),
            TokenError::KeyNotFound(String::new()),
            TokenError::SignatureInvalid,
            TokenError::TokenExpired(0),
            TokenError::TokenNotYetValid(0),
            TokenError::RemoteFetchFailure(String::new()),
            TokenError::InvalidKey(String::new()),
            TokenError::Crypto(String::new()),
            TokenError::Config(String::new()),
        ];

        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err: TokenError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, TokenError::MalformedToken(_)));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(TokenError::SignatureInvalid.is_rejection());
        assert!(TokenError::TokenExpired(1).is_rejection());
        assert!(!TokenError::RemoteFetchFailure("timeout".into()).is_rejection());
    }
}
