//! Signer
//!
//! Issues tokens. Algorithm and key selection follows a fixed precedence,
//! first matching rule wins:
//!
//! 1. `weakSecret` -> HS256 with the weak secret
//! 2. `algorithmConfusion` and the caller asked for a non-default algorithm
//!    -> the caller's algorithm, with the key of its class
//! 3. otherwise -> RS256 with the engine's RSA key (the secure default)

use chrono::Utc;
use tracing::{debug, warn};

use crate::codec;
use crate::crypto::{self, Algorithm, AlgorithmFamily, SigningKey};
use crate::error::{Result, TokenError};
use crate::keys::KeyMaterialProvider;
use crate::policy::PolicySet;
use crate::types::{Claims, Header};

/// Default token lifetime, in seconds
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Algorithm used when no toggle says otherwise
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Caller options for issuance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueOptions {
    /// Lifetime in seconds; `DEFAULT_TTL_SECS` when absent
    pub ttl: Option<u64>,
    /// Requested algorithm; honoured only under `algorithmConfusion`
    pub algorithm: Option<Algorithm>,
}

impl IssueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
}

/// Token signer
pub struct Signer<'a> {
    policy: &'a PolicySet,
    keys: &'a KeyMaterialProvider,
}

impl<'a> Signer<'a> {
    pub fn new(policy: &'a PolicySet, keys: &'a KeyMaterialProvider) -> Self {
        Self { policy, keys }
    }

    /// Issue a token for `claims`
    ///
    /// `iat` is set to now and `exp` to `iat + ttl`, overwriting any values
    /// the caller supplied.
    pub fn issue(&self, claims: Claims, options: &IssueOptions) -> Result<String> {
        self.issue_at(claims, options, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, mut claims: Claims, options: &IssueOptions, now: i64) -> Result<String> {
        let ttl = options.ttl.unwrap_or(DEFAULT_TTL_SECS);
        if ttl == 0 {
            return Err(TokenError::Config("ttl must be positive".into()));
        }
        let exp = i64::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| TokenError::Config(format!("ttl {} overflows exp", ttl)))?;
        claims.set_temporal(now, exp);

        let (algorithm, key) = self.select(options)?;

        let mut header = Header::new(algorithm.as_str());
        if algorithm.family() == AlgorithmFamily::Rsa {
            header = header.with_kid(self.keys.key_id());
        }

        let signing_input = codec::signing_input(&header, &claims)?;
        let signature = crypto::sign(algorithm, &key, signing_input.as_bytes())?;

        debug!(alg = %algorithm, iat = now, exp = exp, "Issued token");

        Ok(codec::seal(&signing_input, &signature))
    }

    fn select(&self, options: &IssueOptions) -> Result<(Algorithm, SigningKey)> {
        if self.policy.weak_secret {
            warn!(toggle = "weakSecret", "SECURITY: signing with the weak HMAC secret");
            return Ok((Algorithm::HS256, SigningKey::Secret(self.keys.weak_secret()?)));
        }

        let requested = options.algorithm.filter(|alg| *alg != DEFAULT_ALGORITHM);

        if let (true, Some(requested)) = (self.policy.algorithm_confusion, requested) {
            warn!(
                toggle = "algorithmConfusion",
                alg = %requested,
                "SECURITY: signing with caller-requested algorithm"
            );
            return match requested.family() {
                AlgorithmFamily::Hmac => {
                    Ok((requested, SigningKey::Secret(self.keys.strong_secret()?)))
                }
                AlgorithmFamily::Rsa => {
                    Ok((requested, SigningKey::Rsa(self.keys.asymmetric_signing_key()?)))
                }
                AlgorithmFamily::Unsigned if self.policy.allow_none => {
                    warn!(toggle = "allowNone", "SECURITY: issuing unsigned token");
                    Ok((Algorithm::None, SigningKey::Unsigned))
                }
                AlgorithmFamily::Unsigned => Err(TokenError::AlgorithmNotAllowed(
                    "unsigned tokens cannot be issued".into(),
                )),
            };
        }

        if let Some(requested) = requested {
            debug!(alg = %requested, "Ignoring requested algorithm");
        }

        Ok((
            DEFAULT_ALGORITHM,
            SigningKey::Rsa(self.keys.asymmetric_signing_key()?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::crypto::{verify, SecretKey, VerificationKey};
    use crate::policy::Toggle;
    use crate::testing::{provider, STRONG_SECRET};
    use std::sync::Arc;

    fn issue(policy: PolicySet, options: IssueOptions) -> Result<String> {
        let keys = provider();
        Signer::new(&policy, &keys).issue_at(Claims::new().with("sub", "alice"), &options, 1_000)
    }

    #[test]
    fn test_default_is_rs256_with_kid() {
        let keys = provider();
        let policy = PolicySet::default();
        let token = Signer::new(&policy, &keys)
            .issue_at(Claims::new().with("sub", "alice"), &IssueOptions::new(), 1_000)
            .unwrap();

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.header.alg, "RS256");
        assert_eq!(decoded.header.typ.as_deref(), Some("JWT"));
        assert_eq!(decoded.header.kid.as_deref(), Some(keys.key_id()));
        assert_eq!(decoded.claims.iat().unwrap(), Some(1_000));
        assert_eq!(decoded.claims.exp().unwrap(), Some(1_000 + DEFAULT_TTL_SECS as i64));

        let public = VerificationKey::Rsa(keys.asymmetric_verification_key().unwrap());
        verify(
            Algorithm::RS256,
            &public,
            decoded.signing_input.as_bytes(),
            &decoded.signature,
        )
        .unwrap();
    }

    #[test]
    fn test_caller_temporal_claims_overwritten() {
        let keys = provider();
        let policy = PolicySet::default();
        let claims = Claims::new().with("iat", 5).with("exp", 6);
        let token = Signer::new(&policy, &keys)
            .issue_at(claims, &IssueOptions::new().ttl(60), 1_000)
            .unwrap();

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.claims.iat().unwrap(), Some(1_000));
        assert_eq!(decoded.claims.exp().unwrap(), Some(1_060));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = issue(PolicySet::default(), IssueOptions::new().ttl(0));
        assert!(matches!(result, Err(TokenError::Config(_))));
    }

    #[test]
    fn test_huge_ttl_rejected() {
        let result = issue(PolicySet::default(), IssueOptions::new().ttl(u64::MAX));
        assert!(matches!(result, Err(TokenError::Config(_))));
    }

    #[test]
    fn test_weak_secret_signs_hs256() {
        let token = issue(PolicySet::default().with(Toggle::WeakSecret), IssueOptions::new()).unwrap();
        let decoded = decode(&token).unwrap();

        assert_eq!(decoded.header.alg, "HS256");
        assert!(decoded.header.kid.is_none());
        verify(
            Algorithm::HS256,
            &VerificationKey::Secret(SecretKey::new(b"secret".to_vec())),
            decoded.signing_input.as_bytes(),
            &decoded.signature,
        )
        .unwrap();
    }

    #[test]
    fn test_weak_secret_beats_algorithm_confusion() {
        let policy = PolicySet::default()
            .with(Toggle::WeakSecret)
            .with(Toggle::AlgorithmConfusion);
        let token = issue(policy, IssueOptions::new().algorithm(Algorithm::HS512)).unwrap();
        let decoded = decode(&token).unwrap();

        assert_eq!(decoded.header.alg, "HS256");
        verify(
            Algorithm::HS256,
            &VerificationKey::Secret(SecretKey::new(b"secret".to_vec())),
            decoded.signing_input.as_bytes(),
            &decoded.signature,
        )
        .unwrap();
    }

    #[test]
    fn test_requested_algorithm_ignored_by_default() {
        let token = issue(PolicySet::default(), IssueOptions::new().algorithm(Algorithm::HS256)).unwrap();
        assert_eq!(decode(&token).unwrap().header.alg, "RS256");

        let token = issue(PolicySet::default(), IssueOptions::new().algorithm(Algorithm::None)).unwrap();
        assert_eq!(decode(&token).unwrap().header.alg, "RS256");
    }

    #[test]
    fn test_algorithm_confusion_honours_hmac_request() {
        let policy = PolicySet::default().with(Toggle::AlgorithmConfusion);
        let token = issue(policy, IssueOptions::new().algorithm(Algorithm::HS384)).unwrap();
        let decoded = decode(&token).unwrap();

        assert_eq!(decoded.header.alg, "HS384");
        verify(
            Algorithm::HS384,
            &VerificationKey::Secret(SecretKey::new(STRONG_SECRET.as_bytes().to_vec())),
            decoded.signing_input.as_bytes(),
            &decoded.signature,
        )
        .unwrap();
    }

    #[test]
    fn test_algorithm_confusion_honours_rsa_request() {
        let keys = provider();
        let policy = PolicySet::default().with(Toggle::AlgorithmConfusion);
        let token = Signer::new(&policy, &keys)
            .issue_at(Claims::new(), &IssueOptions::new().algorithm(Algorithm::RS512), 1_000)
            .unwrap();
        let decoded = decode(&token).unwrap();

        assert_eq!(decoded.header.alg, "RS512");
        assert_eq!(decoded.header.kid.as_deref(), Some(keys.key_id()));
        let public: Arc<_> = keys.asymmetric_verification_key().unwrap();
        verify(
            Algorithm::RS512,
            &VerificationKey::Rsa(public),
            decoded.signing_input.as_bytes(),
            &decoded.signature,
        )
        .unwrap();
    }

    #[test]
    fn test_unsigned_request_needs_allow_none() {
        let policy = PolicySet::default().with(Toggle::AlgorithmConfusion);
        let result = issue(policy, IssueOptions::new().algorithm(Algorithm::None));
        assert!(matches!(result, Err(TokenError::AlgorithmNotAllowed(_))));

        let token = issue(
            policy.with(Toggle::AllowNone),
            IssueOptions::new().algorithm(Algorithm::None),
        )
        .unwrap();
        assert!(token.ends_with('.'));
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.header.alg, "none");
        assert!(decoded.signature.is_empty());
    }
}
