//! Token header and claims

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TokenError};

/// Header `typ` written by the signer
pub const TOKEN_TYPE: &str = "JWT";

/// Token header
///
/// Produced by the signer at issuance. At verification every field is
/// untrusted input; the key hints (`kid`, `jwk`, `jku`, `x5u`) are only
/// consulted when the policy set enables the matching toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Algorithm name; absent means RS256
    #[serde(default = "default_alg")]
    pub alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Embedded public key (JWK object), parsed only when used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Value>,

    /// Key-set URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jku: Option<String>,

    /// Certificate URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,
}

fn default_alg() -> String {
    "RS256".to_string()
}

impl Header {
    /// Header for `alg` with the standard `typ`
    pub fn new(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            typ: Some(TOKEN_TYPE.to_string()),
            kid: None,
            jwk: None,
            jku: None,
            x5u: None,
        }
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_jwk(mut self, jwk: Value) -> Self {
        self.jwk = Some(jwk);
        self
    }

    pub fn with_jku(mut self, url: impl Into<String>) -> Self {
        self.jku = Some(url.into());
        self
    }

    pub fn with_x5u(mut self, url: impl Into<String>) -> Self {
        self.x5u = Some(url.into());
        self
    }
}

/// Open claims mapping
///
/// Callers may put any JSON fields in here. `iat` and `exp` are reserved
/// and overwritten by the signer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claim (builder style)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Issued-at, unix seconds
    pub fn iat(&self) -> Result<Option<i64>> {
        self.numeric("iat")
    }

    /// Expiry, unix seconds
    pub fn exp(&self) -> Result<Option<i64>> {
        self.numeric("exp")
    }

    /// Subject, when present and a string
    pub fn sub(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// Set the engine-managed temporal fields
    pub(crate) fn set_temporal(&mut self, iat: i64, exp: i64) {
        self.0.insert("iat".into(), Value::from(iat));
        self.0.insert("exp".into(), Value::from(exp));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn numeric(&self, name: &str) -> Result<Option<i64>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) if n.is_f64() => Err(TokenError::MalformedToken(format!(
                "'{}' must be an integer",
                name
            ))),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| TokenError::MalformedToken(format!("'{}' is out of range", name))),
            Some(_) => Err(TokenError::MalformedToken(format!(
                "'{}' must be a numeric date",
                name
            ))),
        }
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Claims {
    type Error = TokenError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(TokenError::MalformedToken(format!(
                "claims must be a JSON object, got {}",
                other
            ))),
        }
    }
}
