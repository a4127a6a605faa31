//! Key Material Provider
//!
//! Resolves and caches the engine's key material:
//! - the fixed RSA key pair (signing key and its public half)
//! - a strong, operator-configured HMAC secret
//! - a deliberately weak HMAC secret
//! - HMAC keys loaded from files named by an identifier
//!
//! Every resource sits behind its own once-initialised cell. Concurrent first
//! callers block on a single load; a successful load is kept for the life of
//! the provider and a failed one is retried on the next call.

use once_cell::sync::OnceCell;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::crypto::SecretKey;
use crate::error::{Result, TokenError};
use crate::jwk::{Jwk, KeySet};

/// Minimum length of the strong secret, in bytes
pub const MIN_STRONG_SECRET_LEN: usize = 32;

/// Default weak secret
pub const DEFAULT_WEAK_SECRET: &str = "secret";

/// Default key ID of the engine's RSA key
pub const DEFAULT_KEY_ID: &str = "tokenforge-rs256";

/// Where a piece of key material comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Read from a file on first use
    File(PathBuf),
    /// Given inline (PEM text or raw secret)
    Inline(String),
}

impl KeySource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        KeySource::File(path.into())
    }

    pub fn inline(value: impl Into<String>) -> Self {
        KeySource::Inline(value.into())
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self {
            KeySource::File(path) => std::fs::read(path)
                .map_err(|e| TokenError::KeyNotFound(format!("{}: {}", path.display(), e))),
            KeySource::Inline(value) => Ok(value.as_bytes().to_vec()),
        }
    }

    fn describe(&self) -> String {
        match self {
            KeySource::File(path) => path.display().to_string(),
            KeySource::Inline(_) => "inline".to_string(),
        }
    }
}

/// Key material configuration
#[derive(Debug, Clone)]
pub struct KeyMaterialConfig {
    /// RSA private key (PKCS#8 or PKCS#1 PEM)
    pub private_key: KeySource,

    /// RSA public key (SPKI or PKCS#1 PEM); derived from the private key when absent
    pub public_key: Option<KeySource>,

    /// Key ID of the RSA key, published in the key set
    pub key_id: String,

    /// Strong HMAC secret
    pub strong_secret: KeySource,

    /// Weak HMAC secret
    pub weak_secret: KeySource,

    /// Directory resolving named HMAC keys
    pub named_key_dir: Option<PathBuf>,
}

impl KeyMaterialConfig {
    pub fn new(private_key: KeySource, strong_secret: KeySource) -> Self {
        Self {
            private_key,
            public_key: None,
            key_id: DEFAULT_KEY_ID.to_string(),
            strong_secret,
            weak_secret: KeySource::inline(DEFAULT_WEAK_SECRET),
            named_key_dir: None,
        }
    }

    pub fn with_public_key(mut self, source: KeySource) -> Self {
        self.public_key = Some(source);
        self
    }

    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = kid.into();
        self
    }

    pub fn with_weak_secret(mut self, source: KeySource) -> Self {
        self.weak_secret = source;
        self
    }

    pub fn with_named_key_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.named_key_dir = Some(dir.into());
        self
    }
}

/// Key Material Provider
///
/// Thread-safe, lazily populated cache of every key the engine uses.
pub struct KeyMaterialProvider {
    config: KeyMaterialConfig,
    private_key: OnceCell<Arc<RsaPrivateKey>>,
    public_key: OnceCell<Arc<RsaPublicKey>>,
    strong_secret: OnceCell<SecretKey>,
    weak_secret: OnceCell<SecretKey>,
    /// Resolved path -> cell; one cell per distinct file
    named: RwLock<HashMap<PathBuf, Arc<OnceCell<SecretKey>>>>,
}

impl std::fmt::Debug for KeyMaterialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterialProvider")
            .field("key_id", &self.config.key_id)
            .field("private_key", &self.config.private_key.describe())
            .field("named_key_dir", &self.config.named_key_dir)
            .finish()
    }
}

impl KeyMaterialProvider {
    /// Create a provider; inline secrets are checked immediately, files on first use
    pub fn new(config: KeyMaterialConfig) -> Result<Self> {
        if config.key_id.is_empty() {
            return Err(TokenError::Config("key id cannot be empty".into()));
        }
        if let KeySource::Inline(secret) = &config.strong_secret {
            check_strong_secret(secret.as_bytes())?;
        }
        if let (KeySource::Inline(strong), KeySource::Inline(weak)) =
            (&config.strong_secret, &config.weak_secret)
        {
            if strong == weak {
                return Err(TokenError::Config(
                    "weak secret must differ from the strong secret".into(),
                ));
            }
        }

        Ok(Self {
            config,
            private_key: OnceCell::new(),
            public_key: OnceCell::new(),
            strong_secret: OnceCell::new(),
            weak_secret: OnceCell::new(),
            named: RwLock::new(HashMap::new()),
        })
    }

    /// Key ID of the engine's RSA key
    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    /// Private half of the fixed RSA key pair
    pub fn asymmetric_signing_key(&self) -> Result<Arc<RsaPrivateKey>> {
        self.private_key
            .get_or_try_init(|| -> Result<_> {
                let pem = pem_text(self.config.private_key.read()?)?;
                let key = RsaPrivateKey::from_pkcs8_pem(&pem)
                    .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
                    .map_err(|e| TokenError::InvalidKey(format!("private key: {}", e)))?;
                info!(
                    kid = %self.config.key_id,
                    source = %self.config.private_key.describe(),
                    "Loaded RSA signing key"
                );
                Ok(Arc::new(key))
            })
            .cloned()
    }

    /// Public half of the fixed RSA key pair
    pub fn asymmetric_verification_key(&self) -> Result<Arc<RsaPublicKey>> {
        self.public_key
            .get_or_try_init(|| -> Result<_> {
                let key = match &self.config.public_key {
                    Some(source) => {
                        let pem = pem_text(source.read()?)?;
                        RsaPublicKey::from_public_key_pem(&pem)
                            .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pem))
                            .map_err(|e| TokenError::InvalidKey(format!("public key: {}", e)))?
                    }
                    None => RsaPublicKey::from(self.asymmetric_signing_key()?.as_ref()),
                };
                info!(kid = %self.config.key_id, "Loaded RSA verification key");
                Ok(Arc::new(key))
            })
            .cloned()
    }

    /// The public key as raw bytes (DER SubjectPublicKeyInfo)
    ///
    /// This is the PEM body with armour and whitespace removed, i.e. what an
    /// attacker gets by downloading the public key and base64-decoding it.
    pub fn asymmetric_verification_key_bytes(&self) -> Result<SecretKey> {
        let der = self
            .asymmetric_verification_key()?
            .to_public_key_der()
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        Ok(SecretKey::new(der.as_bytes().to_vec()))
    }

    /// Strong HMAC secret
    pub fn strong_secret(&self) -> Result<SecretKey> {
        self.strong_secret
            .get_or_try_init(|| -> Result<_> {
                let bytes = self.config.strong_secret.read()?;
                check_strong_secret(&bytes)?;
                Ok(SecretKey::new(bytes))
            })
            .cloned()
    }

    /// Weak HMAC secret
    pub fn weak_secret(&self) -> Result<SecretKey> {
        self.weak_secret
            .get_or_try_init(|| -> Result<_> {
                Ok(SecretKey::new(self.config.weak_secret.read()?))
            })
            .cloned()
    }

    /// Named HMAC key, hardened lookup
    ///
    /// The identifier must be a single plain file name inside the named key
    /// directory; separators, `..`, absolute paths and NUL are rejected with
    /// `KeyNotFound`.
    ///
    /// Verification never calls this: with `keyIdInjection` off the trust
    /// resolver ignores `kid` for HMAC tokens. It is for hosts that resolve
    /// partner keys by identifier themselves.
    pub fn named_symmetric_key(&self, identifier: &str) -> Result<SecretKey> {
        let dir = self.named_key_dir()?;
        if !is_plain_file_name(identifier) {
            debug!(kid = %identifier, "Rejected key identifier outside the key directory");
            return Err(TokenError::KeyNotFound(format!(
                "key identifier '{}' is not a plain file name",
                identifier
            )));
        }
        self.load_named(identifier, dir.join(identifier))
    }

    /// Named HMAC key, identifier joined onto the key directory verbatim
    ///
    /// No sanitization: `../` walks out of the directory and an absolute
    /// identifier replaces it. Only reachable through `keyIdInjection`.
    pub fn named_symmetric_key_unchecked(&self, identifier: &str) -> Result<SecretKey> {
        let dir = self.named_key_dir()?;
        self.load_named(identifier, dir.join(identifier))
    }

    /// Key-Set Publisher: the engine's own public key as a JWKS document
    pub fn key_set(&self) -> Result<KeySet> {
        let public = self.asymmetric_verification_key()?;
        Ok(KeySet::new(vec![Jwk::from_rsa(
            self.config.key_id.clone(),
            "RS256",
            &public,
        )]))
    }

    fn named_key_dir(&self) -> Result<&Path> {
        self.config
            .named_key_dir
            .as_deref()
            .ok_or_else(|| TokenError::KeyNotFound("no named key directory configured".into()))
    }

    fn load_named(&self, identifier: &str, path: PathBuf) -> Result<SecretKey> {
        let cell = {
            let named = self.named.read().unwrap_or_else(PoisonError::into_inner);
            named.get(&path).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut named = self.named.write().unwrap_or_else(PoisonError::into_inner);
                named.entry(path.clone()).or_default().clone()
            }
        };

        let loaded = cell
            .get_or_try_init(|| -> Result<_> {
                let bytes = std::fs::read(&path).map_err(|e| {
                    TokenError::KeyNotFound(format!("key '{}' ({}): {}", identifier, path.display(), e))
                })?;
                info!(kid = %identifier, path = %path.display(), "Loaded named HMAC key");
                Ok(SecretKey::new(bytes))
            })
            .cloned();

        if loaded.is_err() {
            // Identifiers are caller-controlled; only successful loads keep an entry
            let mut named = self.named.write().unwrap_or_else(PoisonError::into_inner);
            if named
                .get(&path)
                .is_some_and(|current| Arc::ptr_eq(current, &cell) && current.get().is_none())
            {
                named.remove(&path);
            }
        }
        loaded
    }

    #[cfg(test)]
    fn named_entries(&self) -> usize {
        self.named.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn check_strong_secret(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_STRONG_SECRET_LEN {
        return Err(TokenError::Config(format!(
            "strong secret must be at least {} bytes, got {}",
            MIN_STRONG_SECRET_LEN,
            bytes.len()
        )));
    }
    Ok(())
}

fn pem_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| TokenError::InvalidKey("PEM is not UTF-8".into()))
}

fn is_plain_file_name(identifier: &str) -> bool {
    if identifier.is_empty() || identifier.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(identifier).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
