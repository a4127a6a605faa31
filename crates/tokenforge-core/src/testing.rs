//! Shared fixtures for unit tests

use crate::keys::{KeyMaterialConfig, KeyMaterialProvider, KeySource};

pub const ENGINE_PRIVATE: &str = include_str!("../tests/fixtures/engine_private.pem");
pub const ATTACKER_PRIVATE: &str = include_str!("../tests/fixtures/attacker_private.pem");
pub const ATTACKER_CERT: &str = include_str!("../tests/fixtures/attacker_cert.pem");
pub const STRONG_SECRET: &str = "unit-test-strong-secret-0123456789abcdef";

pub fn config() -> KeyMaterialConfig {
    KeyMaterialConfig::new(KeySource::inline(ENGINE_PRIVATE), KeySource::inline(STRONG_SECRET))
        .with_key_id("engine-test")
}

pub fn provider() -> KeyMaterialProvider {
    KeyMaterialProvider::new(config()).expect("test key material")
}
