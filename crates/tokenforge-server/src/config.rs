//! Server configuration from the environment

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use tokenforge_core::{
    FetchConfig, HttpKeyFetcher, KeyMaterialConfig, KeyMaterialProvider, KeySource, PolicySet,
    TokenEngine, TokenError,
};

pub const ENV_PORT: &str = "TOKENFORGE_PORT";
pub const ENV_LOG_LEVEL: &str = "TOKENFORGE_LOG_LEVEL";
pub const ENV_PRIVATE_KEY_PATH: &str = "TOKENFORGE_PRIVATE_KEY_PATH";
pub const ENV_PUBLIC_KEY_PATH: &str = "TOKENFORGE_PUBLIC_KEY_PATH";
pub const ENV_KEY_ID: &str = "TOKENFORGE_KEY_ID";
pub const ENV_SECRET: &str = "TOKENFORGE_SECRET";
pub const ENV_WEAK_SECRET: &str = "TOKENFORGE_WEAK_SECRET";
pub const ENV_KEY_DIR: &str = "TOKENFORGE_KEY_DIR";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "TOKENFORGE_FETCH_TIMEOUT_SECS";
pub const ENV_POLICY: &str = "TOKENFORGE_POLICY";

pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors, reported once at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Invalid {name}: {source}")]
    Engine {
        name: &'static str,
        #[source]
        source: TokenError,
    },
}

/// Everything the server needs to start
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub policy: PolicySet,
    pub keys: KeyMaterialConfig,
    pub fetch: FetchConfig,
}

impl ServerConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match get(ENV_PORT) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: ENV_PORT,
                reason: format!("'{}' is not a port number", value),
            })?,
            None => DEFAULT_PORT,
        };

        let policy = match get(ENV_POLICY) {
            Some(names) => PolicySet::from_names(names.split(',')).map_err(|source| {
                ConfigError::Engine {
                    name: ENV_POLICY,
                    source,
                }
            })?,
            None => PolicySet::default(),
        };

        let private_key = get(ENV_PRIVATE_KEY_PATH).ok_or(ConfigError::Missing(ENV_PRIVATE_KEY_PATH))?;
        let secret = get(ENV_SECRET).ok_or(ConfigError::Missing(ENV_SECRET))?;

        let mut keys = KeyMaterialConfig::new(KeySource::file(private_key), KeySource::inline(secret));
        if let Some(path) = get(ENV_PUBLIC_KEY_PATH) {
            keys = keys.with_public_key(KeySource::file(path));
        }
        if let Some(kid) = get(ENV_KEY_ID) {
            keys = keys.with_key_id(kid);
        }
        if let Some(weak) = get(ENV_WEAK_SECRET) {
            keys = keys.with_weak_secret(KeySource::inline(weak));
        }
        if let Some(dir) = get(ENV_KEY_DIR) {
            keys = keys.with_named_key_dir(PathBuf::from(dir));
        }

        let mut fetch = FetchConfig::default();
        if let Some(value) = get(ENV_FETCH_TIMEOUT_SECS) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: ENV_FETCH_TIMEOUT_SECS,
                reason: format!("'{}' is not a number of seconds", value),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: ENV_FETCH_TIMEOUT_SECS,
                    reason: "timeout must be positive".into(),
                });
            }
            fetch.timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            port,
            policy,
            keys,
            fetch,
        })
    }

    /// Build the engine this configuration describes
    pub fn build_engine(&self) -> Result<TokenEngine, ConfigError> {
        let keys = KeyMaterialProvider::new(self.keys.clone()).map_err(|source| ConfigError::Engine {
            name: "key material",
            source,
        })?;
        let fetcher = HttpKeyFetcher::new(self.fetch.clone()).map_err(|source| ConfigError::Engine {
            name: "fetch configuration",
            source,
        })?;
        Ok(TokenEngine::with_parts(self.policy, keys, Arc::new(fetcher)))
    }
}

/// Log level from `TOKENFORGE_LOG_LEVEL`, `info` when unset or unparsable
pub fn log_level() -> Level {
    env::var(ENV_LOG_LEVEL)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(Level::INFO)
}
