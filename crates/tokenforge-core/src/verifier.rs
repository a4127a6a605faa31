//! Verifier
//!
//! decode -> resolve trust -> check signature -> check temporal claims

use chrono::Utc;
use tracing::{debug, warn};

use crate::codec;
use crate::crypto;
use crate::error::{Result, TokenError};
use crate::fetch::KeyFetcher;
use crate::keys::KeyMaterialProvider;
use crate::policy::PolicySet;
use crate::trust::{Trust, TrustResolver};
use crate::types::Claims;

/// How far in the future `iat` may lie before a token is rejected
pub const ISSUED_AT_LEEWAY_SECS: i64 = 60;

/// Token verifier
pub struct Verifier<'a> {
    policy: &'a PolicySet,
    keys: &'a KeyMaterialProvider,
    fetcher: &'a dyn KeyFetcher,
}

impl<'a> Verifier<'a> {
    pub fn new(
        policy: &'a PolicySet,
        keys: &'a KeyMaterialProvider,
        fetcher: &'a dyn KeyFetcher,
    ) -> Self {
        Self {
            policy,
            keys,
            fetcher,
        }
    }

    /// Verify `token` and return its claims
    pub async fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    /// Verify `token` as if the current time were `now`
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<Claims> {
        let decoded = codec::decode(token)?;

        let trust = TrustResolver::new(self.policy, self.keys, self.fetcher)
            .resolve(&decoded.header)
            .await?;

        match trust {
            Trust::Skip(reason) => {
                debug!(reason = ?reason, "Signature check skipped");
            }
            Trust::Verify {
                algorithm,
                key,
                origin,
            } => {
                crypto::verify(
                    algorithm,
                    &key,
                    decoded.signing_input.as_bytes(),
                    &decoded.signature,
                )?;
                debug!(alg = %algorithm, origin = ?origin, "Signature verified");
            }
        }

        self.check_temporal(&decoded.claims, now)?;

        Ok(decoded.claims)
    }

    fn check_temporal(&self, claims: &Claims, now: i64) -> Result<()> {
        if let Some(exp) = claims.exp()? {
            if exp < now {
                if !self.policy.disable_expiration {
                    return Err(TokenError::TokenExpired(exp));
                }
                warn!(
                    toggle = "disableExpiration",
                    exp = exp,
                    "SECURITY: accepting expired token"
                );
            }
        }

        if let Some(iat) = claims.iat()? {
            if iat > now.saturating_add(ISSUED_AT_LEEWAY_SECS) {
                if !self.policy.disable_issued_at_check {
                    return Err(TokenError::TokenNotYetValid(iat));
                }
                warn!(
                    toggle = "disableIssuedAtCheck",
                    iat = iat,
                    "SECURITY: accepting token issued in the future"
                );
            }
        }

        Ok(())
    }
}
