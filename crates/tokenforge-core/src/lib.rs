//! # TokenForge Core
//!
//! A bearer-token engine whose security controls can be selectively weakened
//! through an explicit policy set, for reproducing token-validation
//! vulnerabilities in training and security testing.
//!
//! ## Components
//!
//! - **Policy Set**: immutable toggles; all off is the hardened posture
//! - **Key Material Provider**: lazily loaded, once-initialized key cache
//! - **Token Codec**: compact `header.claims.signature` encoding
//! - **Signer**: issues tokens
//! - **Trust Resolver**: picks the algorithm and key a token is checked against
//! - **Verifier**: decode, resolve trust, check signature, check `exp`/`iat`
//! - **Key-Set Publisher**: the engine's public key as a JWKS document
//!
//! ## Secure defaults
//!
//! With `PolicySet::default()` tokens are issued as RS256 and verified only
//! against the engine's own key, selected by `kid`. Header key hints (`jwk`,
//! `jku`, `x5u`) and unsigned tokens are refused. Each weakened path is
//! reachable only through its named toggle and logs a `SECURITY:` warning.

pub mod codec;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod jwk;
pub mod keys;
pub mod policy;
pub mod signer;
pub mod trust;
pub mod types;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use codec::DecodedToken;
pub use crypto::{Algorithm, AlgorithmFamily, SecretKey, SigningKey, VerificationKey};
pub use engine::TokenEngine;
pub use error::{Result, TokenError};
pub use fetch::{FetchConfig, HttpKeyFetcher, KeyFetcher};
pub use jwk::{Jwk, KeySet};
pub use keys::{KeyMaterialConfig, KeyMaterialProvider, KeySource};
pub use policy::{PolicyConflict, PolicySet, Toggle};
pub use signer::{IssueOptions, Signer};
pub use trust::{KeyOrigin, SkipReason, Trust, TrustResolver};
pub use types::{Claims, Header};
pub use verifier::Verifier;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
