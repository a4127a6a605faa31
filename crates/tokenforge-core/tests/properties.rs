//! Property-Based Tests for the token engine
//!
//! 1. ROUND TRIP: verify(issue(claims)) returns the claims plus iat/exp
//! 2. INTEGRITY: flipping any signature byte fails with SignatureInvalid
//! 3. STRUCTURE: decode never panics and rejects anything without three segments

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::OnceLock;
use tokenforge_core::{
    codec, Claims, IssueOptions, KeyMaterialConfig, KeyMaterialProvider, KeySource, PolicySet,
    TokenEngine, TokenError,
};

const ENGINE_PRIVATE_PEM: &str = include_str!("fixtures/engine_private.pem");
const NOW: i64 = 1_700_000_000;

fn engine() -> &'static TokenEngine {
    static ENGINE: OnceLock<TokenEngine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        let config = KeyMaterialConfig::new(
            KeySource::inline(ENGINE_PRIVATE_PEM),
            KeySource::inline("property-test-strong-secret-4d1c9b7e20a3"),
        );
        TokenEngine::new(
            PolicySet::default(),
            KeyMaterialProvider::new(config).expect("key material"),
        )
        .expect("engine")
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn claim_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 _.:/-]{0,24}".prop_map(Value::from),
        prop::collection::vec("[a-z]{1,8}", 0..4).prop_map(Value::from),
    ]
}

fn claims_strategy() -> impl Strategy<Value = Claims> {
    prop::collection::btree_map("[a-z_]{1,12}", claim_value(), 0..8).prop_map(|map| {
        map.into_iter()
            .filter(|(name, _)| name != "iat" && name != "exp")
            .fold(Claims::new(), |claims, (name, value)| claims.with(name, value))
    })
}

// =============================================================================
// PROPERTY 1: ROUND TRIP
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Claims survive issue -> verify unchanged, with iat/exp added
    #[test]
    fn prop_issue_verify_round_trip(claims in claims_strategy(), ttl in 1u64..86_400) {
        let engine = engine();
        let token = engine
            .issue_at(claims.clone(), &IssueOptions::new().ttl(ttl), NOW)
            .expect("issue should succeed");

        let verified = runtime()
            .block_on(engine.verify_at(&token, NOW))
            .expect("verify should succeed");

        prop_assert_eq!(verified.iat().unwrap(), Some(NOW));
        prop_assert_eq!(verified.exp().unwrap(), Some(NOW + ttl as i64));
        prop_assert!(verified.exp().unwrap() > verified.iat().unwrap());
        prop_assert_eq!(verified.len(), claims.len() + 2);
        for (name, value) in claims.as_map() {
            prop_assert_eq!(verified.get(name), Some(value));
        }
    }
}

// =============================================================================
// PROPERTY 2: INTEGRITY
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any single flipped signature byte invalidates the token
    #[test]
    fn prop_signature_byte_flip_rejected(index in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let engine = engine();
        let token = engine
            .issue_at(Claims::new().with("sub", "alice"), &IssueOptions::new(), NOW)
            .expect("issue should succeed");

        let (signing_input, signature) = token.rsplit_once('.').expect("three segments");
        let mut bytes = URL_SAFE_NO_PAD.decode(signature).expect("signature base64");
        let i = index.index(bytes.len());
        bytes[i] ^= mask;
        let tampered = codec::seal(signing_input, &bytes);

        let result = runtime().block_on(engine.verify_at(&tampered, NOW));
        prop_assert!(matches!(result, Err(TokenError::SignatureInvalid)), "{:?}", result);
    }
}

// =============================================================================
// PROPERTY 3: STRUCTURE
// =============================================================================

proptest! {
    /// Arbitrary text never panics the decoder
    #[test]
    fn prop_decode_never_panics(input in ".{0,200}") {
        let _ = codec::decode(&input);
    }

    /// Anything without exactly three segments is malformed
    #[test]
    fn prop_wrong_segment_count_malformed(
        segments in prop::collection::vec("[A-Za-z0-9_-]{0,16}", 0..6)
    ) {
        prop_assume!(segments.len() != 3);
        let token = segments.join(".");
        prop_assert!(matches!(codec::decode(&token), Err(TokenError::MalformedToken(_))));
    }
}
