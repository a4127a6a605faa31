//! Policy Set
//!
//! The immutable set of named toggles that selectively weakens the engine.
//! A `PolicySet` is built once before the engine serves requests and is
//! captured by the engine at construction; nothing mutates it afterwards.
//!
//! Every toggle defaults to `false`, and an all-false set is the hardened
//! posture: each weakened behavior is reachable only through its own toggle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TokenError;

/// A single weakenable behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Toggle {
    /// Skip verification entirely; every token is accepted
    DisableValidation,
    /// Accept (and issue on request) unsigned `alg: "none"` tokens
    AllowNone,
    /// Sign and verify HMAC tokens with a short, guessable secret
    WeakSecret,
    /// Verify HMAC tokens with the public RSA key bytes as the secret
    AlgorithmConfusion,
    /// Load HMAC keys from the header `kid` without sanitization
    KeyIdInjection,
    /// Trust an RSA key embedded in the header `jwk`
    EmbeddedKeyInjection,
    /// Fetch a key set from the header `jku`
    RemoteKeySetInjection,
    /// Fetch a certificate from the header `x5u`
    RemoteCertInjection,
    /// Ignore `exp`
    DisableExpiration,
    /// Ignore `iat` values in the future
    DisableIssuedAtCheck,
}

impl Toggle {
    /// All toggles, in decision-table order
    pub const ALL: [Toggle; 10] = [
        Toggle::DisableValidation,
        Toggle::AllowNone,
        Toggle::WeakSecret,
        Toggle::AlgorithmConfusion,
        Toggle::KeyIdInjection,
        Toggle::EmbeddedKeyInjection,
        Toggle::RemoteKeySetInjection,
        Toggle::RemoteCertInjection,
        Toggle::DisableExpiration,
        Toggle::DisableIssuedAtCheck,
    ];

    /// The toggle's external name
    pub fn as_str(&self) -> &'static str {
        match self {
            Toggle::DisableValidation => "disableValidation",
            Toggle::AllowNone => "allowNone",
            Toggle::WeakSecret => "weakSecret",
            Toggle::AlgorithmConfusion => "algorithmConfusion",
            Toggle::KeyIdInjection => "keyIdInjection",
            Toggle::EmbeddedKeyInjection => "embeddedKeyInjection",
            Toggle::RemoteKeySetInjection => "remoteKeySetInjection",
            Toggle::RemoteCertInjection => "remoteCertInjection",
            Toggle::DisableExpiration => "disableExpiration",
            Toggle::DisableIssuedAtCheck => "disableIssuedAtCheck",
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Toggle {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Toggle::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TokenError::Config(format!("unknown policy toggle '{}'", s)))
    }
}

/// Immutable set of policy toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PolicySet {
    pub disable_validation: bool,
    pub allow_none: bool,
    pub weak_secret: bool,
    pub algorithm_confusion: bool,
    pub key_id_injection: bool,
    pub embedded_key_injection: bool,
    pub remote_key_set_injection: bool,
    pub remote_cert_injection: bool,
    pub disable_expiration: bool,
    pub disable_issued_at_check: bool,
}

impl PolicySet {
    /// The hardened policy: every toggle off
    pub fn hardened() -> Self {
        Self::default()
    }

    /// Return a copy with `toggle` enabled
    pub fn with(mut self, toggle: Toggle) -> Self {
        *self.slot(toggle) = true;
        self
    }

    /// Build a policy from toggle names; unknown names are rejected
    pub fn from_names<I, S>(names: I) -> Result<Self, TokenError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .try_fold(Self::default(), |policy, name| {
                Ok(policy.with(name.parse::<Toggle>()?))
            })
    }

    /// Whether `toggle` is enabled
    pub fn enabled(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::DisableValidation => self.disable_validation,
            Toggle::AllowNone => self.allow_none,
            Toggle::WeakSecret => self.weak_secret,
            Toggle::AlgorithmConfusion => self.algorithm_confusion,
            Toggle::KeyIdInjection => self.key_id_injection,
            Toggle::EmbeddedKeyInjection => self.embedded_key_injection,
            Toggle::RemoteKeySetInjection => self.remote_key_set_injection,
            Toggle::RemoteCertInjection => self.remote_cert_injection,
            Toggle::DisableExpiration => self.disable_expiration,
            Toggle::DisableIssuedAtCheck => self.disable_issued_at_check,
        }
    }

    /// Enabled toggles, in decision-table order
    pub fn enabled_toggles(&self) -> Vec<Toggle> {
        Toggle::ALL
            .iter()
            .copied()
            .filter(|t| self.enabled(*t))
            .collect()
    }

    /// Whether every toggle is off
    pub fn is_hardened(&self) -> bool {
        self.enabled_toggles().is_empty()
    }

    /// Documented combinations whose outcome is surprising
    ///
    /// The engine never rejects these. Precedence is fixed by the signer and
    /// resolver decision tables; this only reports what that precedence hides.
    pub fn conflicts(&self) -> Vec<PolicyConflict> {
        let mut conflicts = Vec::new();

        if self.weak_secret && self.algorithm_confusion {
            conflicts.push(PolicyConflict {
                toggles: vec![Toggle::WeakSecret, Toggle::AlgorithmConfusion],
                outcome: "issuance signs HS256 with the weak secret while verification \
                          keys HS256 with the public key bytes; self-issued tokens fail",
            });
        }

        if self.disable_validation && self.enabled_toggles().len() > 1 {
            conflicts.push(PolicyConflict {
                toggles: self.enabled_toggles(),
                outcome: "disableValidation short-circuits every other verification toggle",
            });
        }

        if self.key_id_injection && self.algorithm_confusion {
            conflicts.push(PolicyConflict {
                toggles: vec![Toggle::AlgorithmConfusion, Toggle::KeyIdInjection],
                outcome: "algorithmConfusion wins for HMAC tokens; kid lookups are unreachable",
            });
        }

        conflicts
    }

    fn slot(&mut self, toggle: Toggle) -> &mut bool {
        match toggle {
            Toggle::DisableValidation => &mut self.disable_validation,
            Toggle::AllowNone => &mut self.allow_none,
            Toggle::WeakSecret => &mut self.weak_secret,
            Toggle::AlgorithmConfusion => &mut self.algorithm_confusion,
            Toggle::KeyIdInjection => &mut self.key_id_injection,
            Toggle::EmbeddedKeyInjection => &mut self.embedded_key_injection,
            Toggle::RemoteKeySetInjection => &mut self.remote_key_set_injection,
            Toggle::RemoteCertInjection => &mut self.remote_cert_injection,
            Toggle::DisableExpiration => &mut self.disable_expiration,
            Toggle::DisableIssuedAtCheck => &mut self.disable_issued_at_check,
        }
    }
}

impl fmt::Display for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled = self.enabled_toggles();
        if enabled.is_empty() {
            return f.write_str("hardened");
        }
        let names: Vec<&str> = enabled.iter().map(|t| t.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

/// A combination of toggles with a non-obvious outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyConflict {
    pub toggles: Vec<Toggle>,
    pub outcome: &'static str,
}

impl Serialize for Toggle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_hardened() {
        let policy = PolicySet::default();
        assert!(policy.is_hardened());
        for toggle in Toggle::ALL {
            assert!(!policy.enabled(toggle), "{} should default to off", toggle);
        }
        assert_eq!(policy.to_string(), "hardened");
    }

    #[test]
    fn test_with_enables_exactly_one() {
        for toggle in Toggle::ALL {
            let policy = PolicySet::default().with(toggle);
            assert_eq!(policy.enabled_toggles(), vec![toggle]);
        }
    }

    #[test]
    fn test_from_names() {
        let policy = PolicySet::from_names(["allowNone", " weakSecret ", ""]).unwrap();
        assert!(policy.allow_none);
        assert!(policy.weak_secret);
        assert!(!policy.disable_validation);
        assert_eq!(policy.to_string(), "allowNone,weakSecret");
    }

    #[test]
    fn test_from_names_rejects_unknown() {
        let result = PolicySet::from_names(["allowNone", "allow-everything"]);
        assert!(matches!(result, Err(TokenError::Config(_))));
    }

    #[test]
    fn test_toggle_names_roundtrip() {
        for toggle in Toggle::ALL {
            assert_eq!(toggle.as_str().parse::<Toggle>().unwrap(), toggle);
        }
    }

    #[test]
    fn test_deserialize_camel_case() {
        let policy: PolicySet =
            serde_json::from_str(r#"{"keyIdInjection": true, "disableExpiration": true}"#).unwrap();
        assert!(policy.key_id_injection);
        assert!(policy.disable_expiration);
        assert_eq!(policy.enabled_toggles().len(), 2);

        let unknown = serde_json::from_str::<PolicySet>(r#"{"noSecurity": true}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_conflicts_reported() {
        assert!(PolicySet::default().conflicts().is_empty());

        let policy = PolicySet::default()
            .with(Toggle::WeakSecret)
            .with(Toggle::AlgorithmConfusion);
        let conflicts = policy.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].toggles,
            vec![Toggle::WeakSecret, Toggle::AlgorithmConfusion]
        );

        let only_validation = PolicySet::default().with(Toggle::DisableValidation);
        assert!(only_validation.conflicts().is_empty());

        let shadowing = only_validation.with(Toggle::AllowNone);
        assert_eq!(shadowing.conflicts().len(), 1);
    }
}
