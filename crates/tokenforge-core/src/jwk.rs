//! JSON Web Keys and the Key-Set Publisher document
//!
//! The same `Jwk` type is used for three things: the engine's own published
//! key set, a public key embedded in a token header (`jwk`), and key-set
//! documents fetched from a header `jku`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TokenError};

/// Individual JWK (JSON Web Key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type
    pub kty: String,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Use (sig for signing)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// RSA modulus, base64url big-endian
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent, base64url big-endian
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Describe an RSA public key as a signing JWK
    pub fn from_rsa(kid: impl Into<String>, alg: impl Into<String>, key: &RsaPublicKey) -> Self {
        Self {
            kty: "RSA".into(),
            kid: Some(kid.into()),
            alg: Some(alg.into()),
            key_use: Some("sig".into()),
            n: Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be())),
            e: Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be())),
        }
    }

    /// Parse a JWK from an arbitrary JSON value (e.g. a header `jwk`)
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| TokenError::InvalidKey(format!("jwk: {}", e)))
    }

    /// Reconstruct the RSA public key this JWK describes
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey> {
        if self.kty != "RSA" {
            return Err(TokenError::InvalidKey(format!(
                "unsupported key type '{}'",
                self.kty
            )));
        }

        let n = self
            .n
            .as_ref()
            .ok_or_else(|| TokenError::InvalidKey("missing RSA modulus".into()))?;
        let e = self
            .e
            .as_ref()
            .ok_or_else(|| TokenError::InvalidKey("missing RSA exponent".into()))?;

        let n = URL_SAFE_NO_PAD
            .decode(n)
            .map_err(|e| TokenError::InvalidKey(format!("modulus: {}", e)))?;
        let e = URL_SAFE_NO_PAD
            .decode(e)
            .map_err(|e| TokenError::InvalidKey(format!("exponent: {}", e)))?;

        RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|e| TokenError::InvalidKey(e.to_string()))
    }
}

/// JWKS (JSON Web Key Set) document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<Jwk>,
}

impl KeySet {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Find a key by key ID
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Key IDs present in this set
    pub fn kids(&self) -> Vec<&str> {
        self.keys.iter().filter_map(|k| k.kid.as_deref()).collect()
    }
}
