//! Trust Resolver
//!
//! Decides, for an untrusted header, which algorithm and key a token must be
//! verified against. Evaluated fresh for every verification; first matching
//! branch wins:
//!
//! 1. `disableValidation` -> skip
//! 2. `alg == "none"` -> skip under `allowNone`, else `AlgorithmNotAllowed`
//! 3. HMAC family:
//!    `algorithmConfusion` -> public key bytes as the secret;
//!    `keyIdInjection` + `kid` -> named key, identifier verbatim;
//!    `weakSecret` -> weak secret;
//!    otherwise -> strong secret
//! 4. RSA family:
//!    `embeddedKeyInjection` + `jwk` -> the embedded key;
//!    `remoteCertInjection` + `x5u` -> key of the fetched certificate;
//!    `remoteKeySetInjection` + `jku` -> `kid` entry of the fetched key set;
//!    otherwise -> `kid` in the engine's own key set
//! 5. anything else -> `UnsupportedAlgorithm`
//!
//! With every toggle off only the final `otherwise` branches are reachable.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::crypto::{Algorithm, AlgorithmFamily, VerificationKey};
use crate::error::{Result, TokenError};
use crate::fetch::{public_key_from_certificate_pem, KeyFetcher};
use crate::jwk::Jwk;
use crate::keys::KeyMaterialProvider;
use crate::policy::PolicySet;
use crate::types::Header;

/// Why verification is skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `disableValidation`
    ValidationDisabled,
    /// `allowNone` on an unsigned token
    UnsignedAllowed,
}

/// Where a resolved key came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    StrongSecret,
    WeakSecret,
    /// RSA public key bytes reused as an HMAC secret
    PublicKeyBytes,
    /// Named key file, by identifier
    NamedKey(String),
    /// Header `jwk`
    EmbeddedJwk,
    /// Certificate at a header `x5u`
    RemoteCertificate(String),
    /// Key set at a header `jku`
    RemoteKeySet(String),
    /// The engine's own key set, by `kid`
    LocalKeySet(String),
}

/// Outcome of trust resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Trust {
    /// Do not check the signature
    Skip(SkipReason),
    /// Check the signature with this algorithm and key
    Verify {
        algorithm: Algorithm,
        key: VerificationKey,
        origin: KeyOrigin,
    },
}

/// Trust Resolver
pub struct TrustResolver<'a> {
    policy: &'a PolicySet,
    keys: &'a KeyMaterialProvider,
    fetcher: &'a dyn KeyFetcher,
}

impl<'a> TrustResolver<'a> {
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

    /// Resolve the trust anchor for `header`
    pub async fn resolve(&self, header: &Header) -> Result<Trust> {
        if self.policy.disable_validation {
            warn!(toggle = "disableValidation", "SECURITY: signature validation disabled");
            return Ok(Trust::Skip(SkipReason::ValidationDisabled));
        }

        if header.alg == Algorithm::None.as_str() {
            if self.policy.allow_none {
                warn!(toggle = "allowNone", "SECURITY: accepting unsigned token");
                return Ok(Trust::Skip(SkipReason::UnsignedAllowed));
            }
            debug!("Rejected unsigned token");
            return Err(TokenError::AlgorithmNotAllowed("none".into()));
        }

        let algorithm: Algorithm = header.alg.parse()?;
        match algorithm.family() {
            AlgorithmFamily::Hmac => self.resolve_hmac(algorithm, header),
            AlgorithmFamily::Rsa => self.resolve_rsa(algorithm, header).await,
            AlgorithmFamily::Unsigned => Err(TokenError::AlgorithmNotAllowed(header.alg.clone())),
        }
    }

    fn resolve_hmac(&self, algorithm: Algorithm, header: &Header) -> Result<Trust> {
        let (key, origin) = if self.policy.algorithm_confusion {
            warn!(
                toggle = "algorithmConfusion",
                alg = %algorithm,
                "SECURITY: verifying HMAC with the public key as secret"
            );
            (
                self.keys.asymmetric_verification_key_bytes()?,
                KeyOrigin::PublicKeyBytes,
            )
        } else if let (true, Some(kid)) = (self.policy.key_id_injection, header.kid.as_deref()) {
            warn!(
                toggle = "keyIdInjection",
                kid = %kid,
                "SECURITY: loading HMAC key from unsanitized kid"
            );
            (
                self.keys.named_symmetric_key_unchecked(kid)?,
                KeyOrigin::NamedKey(kid.to_string()),
            )
        } else if self.policy.weak_secret {
            warn!(toggle = "weakSecret", "SECURITY: verifying HMAC with the weak secret");
            (self.keys.weak_secret()?, KeyOrigin::WeakSecret)
        } else {
            debug!(alg = %algorithm, "Verifying HMAC with the strong secret");
            (self.keys.strong_secret()?, KeyOrigin::StrongSecret)
        };

        Ok(Trust::Verify {
            algorithm,
            key: VerificationKey::Secret(key),
            origin,
        })
    }

    async fn resolve_rsa(&self, algorithm: Algorithm, header: &Header) -> Result<Trust> {
        let (key, origin) = if let (true, Some(jwk)) =
            (self.policy.embedded_key_injection, header.jwk.as_ref())
        {
            warn!(toggle = "embeddedKeyInjection", "SECURITY: trusting key embedded in header");
            let key = Jwk::from_value(jwk)?.to_rsa_public_key()?;
            (key, KeyOrigin::EmbeddedJwk)
        } else if let (true, Some(url)) = (self.policy.remote_cert_injection, header.x5u.as_deref())
        {
            warn!(
                toggle = "remoteCertInjection",
                url = %url,
                "SECURITY: trusting certificate from header URL"
            );
            let pem = self.fetcher.fetch_certificate(url).await?;
            let key = public_key_from_certificate_pem(&pem)?;
            (key, KeyOrigin::RemoteCertificate(url.to_string()))
        } else if let (true, Some(url)) =
            (self.policy.remote_key_set_injection, header.jku.as_deref())
        {
            warn!(
                toggle = "remoteKeySetInjection",
                url = %url,
                "SECURITY: trusting key set from header URL"
            );
            let kid = header
                .kid
                .as_deref()
                .ok_or_else(|| TokenError::UnknownKeyId("missing kid".into()))?;
            let set = self.fetcher.fetch_key_set(url).await?;
            let key = set
                .find(kid)
                .ok_or_else(|| TokenError::UnknownKeyId(kid.to_string()))?
                .to_rsa_public_key()?;
            (key, KeyOrigin::RemoteKeySet(url.to_string()))
        } else {
            let kid = header
                .kid
                .as_deref()
                .ok_or_else(|| TokenError::UnknownKeyId("missing kid".into()))?;
            if kid != self.keys.key_id() {
                debug!(kid = %kid, "Unknown kid for local key set");
                return Err(TokenError::UnknownKeyId(kid.to_string()));
            }
            let key = self.keys.asymmetric_verification_key()?;
            return Ok(Trust::Verify {
                algorithm,
                key: VerificationKey::Rsa(key),
                origin: KeyOrigin::LocalKeySet(kid.to_string()),
            });
        };

        Ok(Trust::Verify {
            algorithm,
            key: VerificationKey::Rsa(Arc::new(key)),
            origin,
        })
    }
}
