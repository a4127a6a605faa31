//! Token engine facade
//!
//! Wires the policy set, key material and remote fetcher together behind
//! the issue/verify operations a host calls per request.

use std::sync::Arc;
use tracing::info;

use crate::codec::{self, DecodedToken};
use crate::error::Result;
use crate::fetch::{FetchConfig, HttpKeyFetcher, KeyFetcher};
use crate::jwk::KeySet;
use crate::keys::KeyMaterialProvider;
use crate::policy::PolicySet;
use crate::signer::{IssueOptions, Signer};
use crate::types::Claims;
use crate::verifier::Verifier;

/// Configurable token engine
///
/// Cheap to clone; clones share key caches.
#[derive(Clone)]
pub struct TokenEngine {
    policy: Arc<PolicySet>,
    keys: Arc<KeyMaterialProvider>,
    fetcher: Arc<dyn KeyFetcher>,
}

impl TokenEngine {
    /// Create an engine with the default HTTP fetcher
    pub fn new(policy: PolicySet, keys: KeyMaterialProvider) -> Result<Self> {
        let fetcher = HttpKeyFetcher::new(FetchConfig::default())?;
        Ok(Self::with_parts(policy, keys, Arc::new(fetcher)))
    }

    /// Create an engine around an existing remote key fetcher
    pub fn with_parts(
        policy: PolicySet,
        keys: KeyMaterialProvider,
        fetcher: Arc<dyn KeyFetcher>,
    ) -> Self {
        info!(
            policy = %policy,
            kid = %keys.key_id(),
            fetcher = fetcher.description(),
            "Token engine created"
        );
        Self {
            policy: Arc::new(policy),
            keys: Arc::new(keys),
            fetcher,
        }
    }

    /// Replace the remote key fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn KeyFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Issue a token for `claims`
    pub fn issue(&self, claims: Claims, options: &IssueOptions) -> Result<String> {
        Signer::new(&self.policy, &self.keys).issue(claims, options)
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, claims: Claims, options: &IssueOptions, now: i64) -> Result<String> {
        Signer::new(&self.policy, &self.keys).issue_at(claims, options, now)
    }

    /// Verify a token and return its claims
    pub async fn verify(&self, token: &str) -> Result<Claims> {
        self.verifier().verify(token).await
    }

    /// Verify a token as if the current time were `now`
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<Claims> {
        self.verifier().verify_at(token, now).await
    }

    /// Structural decode, no verification
    pub fn decode(&self, token: &str) -> Result<DecodedToken> {
        codec::decode(token)
    }

    /// The engine's own public key set
    pub fn key_set(&self) -> Result<KeySet> {
        self.keys.key_set()
    }

    pub fn policy(&self) -> &PolicySet {
        &self.policy
    }

    pub fn keys(&self) -> &KeyMaterialProvider {
        &self.keys
    }

    /// Description of the remote key fetcher in use
    pub fn fetcher_description(&self) -> &str {
        self.fetcher.description()
    }

    fn verifier(&self) -> Verifier<'_> {
        Verifier::new(&self.policy, &self.keys, self.fetcher.as_ref())
    }
}

impl std::fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEngine")
            .field("policy", &self.policy)
            .field("keys", &self.keys)
            .field("fetcher", &self.fetcher.description())
            .finish()
    }
}
