//! Cryptographic primitives for token signing
//!
//! HMAC-SHA2 for the symmetric family, RSASSA-PKCS1-v1_5 with SHA2 for the
//! asymmetric family, and the unsigned `none` pseudo-algorithm.
//!
//! Key types:
//! - `SecretKey`: raw HMAC secret bytes
//! - `SigningKey`: what the signer holds
//! - `VerificationKey`: what the trust resolver hands to the verifier

use hmac::{Hmac, Mac};
use rsa::pkcs1v15;
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::{Result, TokenError};

/// Signature algorithms known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    /// Unsigned pseudo-algorithm
    None,
}

/// Key class an algorithm needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac,
    Rsa,
    Unsigned,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
            Algorithm::RS256 => "RS256",
            Algorithm::RS384 => "RS384",
            Algorithm::RS512 => "RS512",
            Algorithm::None => "none",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => AlgorithmFamily::Hmac,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => AlgorithmFamily::Rsa,
            Algorithm::None => AlgorithmFamily::Unsigned,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TokenError;

    /// Exact, case-sensitive match; `"None"` is not `"none"`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            "none" => Ok(Algorithm::None),
            other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Raw HMAC secret
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Arc<[u8]>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("len", &self.0.len())
            .field("bytes", &"[redacted]")
            .finish()
    }
}

/// Key material held by the signer
#[derive(Clone)]
pub enum SigningKey {
    Secret(SecretKey),
    Rsa(Arc<RsaPrivateKey>),
    Unsigned,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningKey::Secret(secret) => f.debug_tuple("Secret").field(secret).finish(),
            SigningKey::Rsa(_) => f.write_str("Rsa([redacted])"),
            SigningKey::Unsigned => f.write_str("Unsigned"),
        }
    }
}

/// Key material a verification is checked against
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationKey {
    Secret(SecretKey),
    Rsa(Arc<RsaPublicKey>),
}

/// Sign `data` with `algorithm` under `key`
///
/// The key class must match the algorithm family; a mismatch is a caller
/// bug and reported as `Crypto`.
pub fn sign(algorithm: Algorithm, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    match (algorithm.family(), key) {
        (AlgorithmFamily::Hmac, SigningKey::Secret(secret)) => hmac_tag(algorithm, secret, data),
        (AlgorithmFamily::Rsa, SigningKey::Rsa(private)) => rsa_sign(algorithm, private, data),
        (AlgorithmFamily::Unsigned, SigningKey::Unsigned) => Ok(Vec::new()),
        (family, key) => Err(TokenError::Crypto(format!(
            "{:?} key cannot produce {:?} signature",
            key, family
        ))),
    }
}

/// Check `signature` over `data` with `algorithm` under `key`
///
/// HMAC tags are compared in constant time. Any mismatch, including a key
/// class that does not fit the algorithm, is `SignatureInvalid`.
pub fn verify(
    algorithm: Algorithm,
    key: &VerificationKey,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    match (algorithm.family(), key) {
        (AlgorithmFamily::Hmac, VerificationKey::Secret(secret)) => {
            let expected = hmac_tag(algorithm, secret, data)?;
            if bool::from(expected.as_slice().ct_eq(signature)) {
                Ok(())
            } else {
                Err(TokenError::SignatureInvalid)
            }
        }
        (AlgorithmFamily::Rsa, VerificationKey::Rsa(public)) => {
            rsa_verify(algorithm, public, data, signature)
        }
        _ => Err(TokenError::SignatureInvalid),
    }
}

fn hmac_tag(algorithm: Algorithm, secret: &SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    fn tag<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = <M as Mac>::new_from_slice(key)
            .map_err(|e| TokenError::Crypto(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    match algorithm {
        Algorithm::HS256 => tag::<Hmac<Sha256>>(secret.as_bytes(), data),
        Algorithm::HS384 => tag::<Hmac<Sha384>>(secret.as_bytes(), data),
        Algorithm::HS512 => tag::<Hmac<Sha512>>(secret.as_bytes(), data),
        other => Err(TokenError::Crypto(format!("{} is not an HMAC algorithm", other))),
    }
}

fn rsa_sign(algorithm: Algorithm, private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    let signature = match algorithm {
        Algorithm::RS256 => pkcs1v15::SigningKey::<Sha256>::new(private.clone())
            .try_sign(data)
            .map(|s| s.to_vec()),
        Algorithm::RS384 => pkcs1v15::SigningKey::<Sha384>::new(private.clone())
            .try_sign(data)
            .map(|s| s.to_vec()),
        Algorithm::RS512 => pkcs1v15::SigningKey::<Sha512>::new(private.clone())
            .try_sign(data)
            .map(|s| s.to_vec()),
        other => return Err(TokenError::Crypto(format!("{} is not an RSA algorithm", other))),
    };
    signature.map_err(|e| TokenError::Crypto(e.to_string()))
}

fn rsa_verify(
    algorithm: Algorithm,
    public: &RsaPublicKey,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    let signature =
        pkcs1v15::Signature::try_from(signature).map_err(|_| TokenError::SignatureInvalid)?;
    let outcome = match algorithm {
        Algorithm::RS256 => {
            pkcs1v15::VerifyingKey::<Sha256>::new(public.clone()).verify(data, &signature)
        }
        Algorithm::RS384 => {
            pkcs1v15::VerifyingKey::<Sha384>::new(public.clone()).verify(data, &signature)
        }
        Algorithm::RS512 => {
            pkcs1v15::VerifyingKey::<Sha512>::new(public.clone()).verify(data, &signature)
        }
        _ => return Err(TokenError::SignatureInvalid),
    };
    outcome.map_err(|_| TokenError::SignatureInvalid)
}
