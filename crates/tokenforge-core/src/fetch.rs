//! Remote key material
//!
//! Fetches the documents a token header can point at: a key set (`jku`) or a
//! PEM certificate (`x5u`). Every fetch is a single bounded-timeout request.
//! Nothing is cached and nothing is retried; a failure surfaces immediately
//! as `RemoteFetchFailure`.

use async_trait::async_trait;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use std::time::Duration;
use tracing::{debug, warn};
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

use crate::error::{Result, TokenError};
use crate::jwk::KeySet;

/// Default timeout for a single fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on a fetched document
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Trait for remote key material sources
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Fetch and parse a key-set document
    async fn fetch_key_set(&self, url: &str) -> Result<KeySet>;

    /// Fetch a PEM certificate, returned as text
    async fn fetch_certificate(&self, url: &str) -> Result<String>;

    /// Get a description of this fetcher (for logging)
    fn description(&self) -> &str {
        "key fetcher"
    }
}

/// Remote fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for the whole request, connect to last byte
    pub timeout: Duration,
    /// Largest accepted response body
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// HTTP key fetcher backed by reqwest
pub struct HttpKeyFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpKeyFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TokenError::Config(format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| TokenError::RemoteFetchFailure(format!("invalid url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TokenError::RemoteFetchFailure(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        debug!(
            url = %url,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Fetching remote key material"
        );

        let result: Result<Vec<u8>> = async {
            let response = self.client.get(parsed).send().await?.error_for_status()?;
            if let Some(len) = response.content_length() {
                if len > self.config.max_body_bytes as u64 {
                    return Err(TokenError::RemoteFetchFailure(format!(
                        "response of {} bytes exceeds limit",
                        len
                    )));
                }
            }
            let body = response.bytes().await?;
            if body.len() > self.config.max_body_bytes {
                return Err(TokenError::RemoteFetchFailure(format!(
                    "response of {} bytes exceeds limit",
                    body.len()
                )));
            }
            Ok(body.to_vec())
        }
        .await;

        if let Err(ref e) = result {
            warn!(url = %url, error = %e, "Remote key material fetch failed");
        }
        result
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch_key_set(&self, url: &str) -> Result<KeySet> {
        let body = self.get(url).await?;
        serde_json::from_slice(&body)
            .map_err(|e| TokenError::RemoteFetchFailure(format!("key set from '{}': {}", url, e)))
    }

    async fn fetch_certificate(&self, url: &str) -> Result<String> {
        let body = self.get(url).await?;
        String::from_utf8(body).map_err(|_| {
            TokenError::RemoteFetchFailure(format!("certificate from '{}' is not text", url))
        })
    }

    fn description(&self) -> &str {
        "HTTP key fetcher"
    }
}

/// Extract the RSA public key from a PEM certificate
///
/// Only the subject public key is read. Validity dates, issuer and signature
/// chain are not checked.
pub fn public_key_from_certificate_pem(pem: &str) -> Result<RsaPublicKey> {
    let cert = Certificate::from_pem(pem.as_bytes())
        .map_err(|e| TokenError::InvalidKey(format!("certificate: {}", e)))?;
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| TokenError::InvalidKey(format!("certificate key: {}", e)))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| TokenError::InvalidKey(format!("certificate key is not RSA: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTACKER_CERT: &str = include_str!("../tests/fixtures/attacker_cert.pem");
    const ATTACKER_PUBLIC: &str = include_str!("../tests/fixtures/attacker_public.pem");

    #[test]
    fn test_certificate_public_key() {
        let from_cert = public_key_from_certificate_pem(ATTACKER_CERT).unwrap();
        let expected = RsaPublicKey::from_public_key_pem(ATTACKER_PUBLIC).unwrap();
        assert_eq!(from_cert, expected);
    }

    #[test]
    fn test_garbage_certificate() {
        assert!(matches!(
            public_key_from_certificate_pem("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n"),
            Err(TokenError::InvalidKey(_))
        ));
        assert!(matches!(
            public_key_from_certificate_pem(ATTACKER_PUBLIC),
            Err(TokenError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = HttpKeyFetcher::new(FetchConfig::default()).unwrap();
        for url in ["file:///etc/passwd", "ftp://keys.example/jwks.json", "not a url"] {
            assert!(matches!(
                fetcher.fetch_key_set(url).await,
                Err(TokenError::RemoteFetchFailure(_))
            ));
        }
    }
}
