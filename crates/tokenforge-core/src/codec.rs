//! Token Codec
//!
//! Compact three-segment serialization: `base64url(header) "." base64url(claims)
//! "." base64url(signature)`. Purely structural; nothing here looks at keys or
//! checks a signature.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{Result, TokenError};
use crate::types::{Claims, Header};

/// Decoder for received segments: padding optional, non-zero trailing bits ignored
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A structurally decoded token
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub header: Header,
    pub claims: Claims,
    /// Raw signature bytes; empty for unsigned tokens
    pub signature: Vec<u8>,
    /// `header_b64 "." claims_b64` exactly as received
    pub signing_input: String,
}

/// Encode the signing input `base64url(header) "." base64url(claims)`
pub fn signing_input(header: &Header, claims: &Claims) -> Result<String> {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    Ok(format!("{}.{}", header_b64, claims_b64))
}

/// Append the signature segment to a signing input
pub fn seal(signing_input: &str, signature: &[u8]) -> String {
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
}

/// Encode a token from its three parts
pub fn encode(header: &Header, claims: &Claims, signature: &[u8]) -> Result<String> {
    Ok(seal(&signing_input(header, claims)?, signature))
}

/// Decode a token into its three parts
///
/// Fails with `MalformedToken` unless the token has exactly three segments,
/// the first two are base64url JSON objects, and the third is base64url
/// (possibly empty). Segments may carry `=` padding and non-canonical
/// trailing bits.
pub fn decode(token: &str) -> Result<DecodedToken> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header: Header = decode_json(segments[0], "header")?;
    let claims: Claims = decode_json(segments[1], "claims")?;
    let signature = LENIENT_URL_SAFE
        .decode(segments[2])
        .map_err(|e| TokenError::MalformedToken(format!("signature: {}", e)))?;

    Ok(DecodedToken {
        header,
        claims,
        signature,
        signing_input: format!("{}.{}", segments[0], segments[1]),
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T> {
    let bytes = LENIENT_URL_SAFE
        .decode(segment)
        .map_err(|e| TokenError::MalformedToken(format!("{}: {}", what, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::MalformedToken(format!("{}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        URL_SAFE_NO_PAD.encode(s)
    }

    #[test]
    fn test_encode_decode() {
        let header = Header::new("HS256");
        let claims = Claims::new().with("sub", "alice").with("admin", false);

        let token = encode(&header, &claims, b"sig-bytes").unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.header, header);
        assert_eq!(decoded.claims, claims);
        assert_eq!(decoded.signature, b"sig-bytes");
        assert!(token.starts_with(&decoded.signing_input));
    }

    #[test]
    fn test_unsigned_token_keeps_three_segments() {
        let token = encode(&Header::new("none"), &Claims::new(), &[]).unwrap();
        assert!(token.ends_with('.'));
        assert_eq!(token.split('.').count(), 3);
        assert!(decode(&token).unwrap().signature.is_empty());
    }

    #[test]
    fn test_signing_input_is_preserved_verbatim() {
        // Non-canonical whitespace must survive so signatures over it still match
        let token = format!("{}.{}.", b64(r#"{ "alg" : "none" }"#), b64(r#"{"sub":"x"}"#));
        let decoded = decode(&token).unwrap();
        assert_eq!(
            decoded.signing_input,
            format!("{}.{}", b64(r#"{ "alg" : "none" }"#), b64(r#"{"sub":"x"}"#))
        );
    }

    #[test]
    fn test_segment_count() {
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(
                matches!(decode(token), Err(TokenError::MalformedToken(_))),
                "{:?} should be malformed",
                token
            );
        }
    }

    #[test]
    fn test_non_json_header() {
        let token = format!("{}.{}.", b64("not json"), b64("{}"));
        assert!(matches!(decode(&token), Err(TokenError::MalformedToken(_))));
    }

    #[test]
    fn test_non_object_claims() {
        let token = format!("{}.{}.", b64(r#"{"alg":"none"}"#), b64("[1,2]"));
        assert!(matches!(decode(&token), Err(TokenError::MalformedToken(_))));
    }

    #[test]
    fn test_signature_decoding_is_lenient() {
        let signing_input = format!("{}.{}", b64(r#"{"alg":"HS256"}"#), b64("{}"));

        // "QQ" and "QR" differ only in trailing bits
        for signature in ["QQ", "QR", "QQ==", "QR=="] {
            let decoded = decode(&format!("{}.{}", signing_input, signature)).unwrap();
            assert_eq!(decoded.signature, b"A", "{:?}", signature);
        }
    }

    #[test]
    fn test_bad_base64() {
        let token = format!("{}.{}.", "!!!", b64("{}"));
        assert!(matches!(decode(&token), Err(TokenError::MalformedToken(_))));

        let token = format!("{}.{}.%%", b64(r#"{"alg":"none"}"#), b64("{}"));
        assert!(matches!(decode(&token), Err(TokenError::MalformedToken(_))));
    }
}
