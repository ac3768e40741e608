//! Assertion format conformance
//!
//! Assertions are compact-JWT shaped so relying parties can decode
//! them with ordinary tooling. These tests pin the wire format:
//! three base64url parts, an EdDSA header, a `user` claim, and no
//! padding characters anywhere.

use accountd_core::{Assertion, KeyPair, PublicKey};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

#[test]
fn test_assertion_has_three_parts() {
    let key = KeyPair::generate();
    let assertion = Assertion::issue("banana", &key).unwrap();
    assert_eq!(assertion.encoded().split('.').count(), 3);
}

#[test]
fn test_header_declares_eddsa_jwt() {
    let key = KeyPair::generate();
    let assertion = Assertion::issue("banana", &key).unwrap();

    let header_b64 = assertion.encoded().split('.').next().unwrap();
    let header: Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).unwrap()).unwrap();
    assert_eq!(header["alg"], "EdDSA");
    assert_eq!(header["typ"], "JWT");
}

#[test]
fn test_payload_carries_user_claim() {
    let key = KeyPair::generate();
    let assertion = Assertion::issue("banana", &key).unwrap();

    let claims_b64 = assertion.encoded().split('.').nth(1).unwrap();
    let claims: Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).unwrap()).unwrap();
    assert_eq!(claims["user"], "banana");
}

#[test]
fn test_encoding_is_base64url_without_padding() {
    let key = KeyPair::generate();
    let assertion = Assertion::issue("some_longer_user_handle", &key).unwrap();

    for part in assertion.encoded().split('.') {
        assert!(!part.is_empty());
        assert!(part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}

#[test]
fn test_signature_is_64_bytes() {
    let key = KeyPair::generate();
    let assertion = Assertion::issue("banana", &key).unwrap();

    let sig_b64 = assertion.encoded().split('.').nth(2).unwrap();
    assert_eq!(URL_SAFE_NO_PAD.decode(sig_b64).unwrap().len(), 64);
}

#[test]
fn test_parse_preserves_encoding_exactly() {
    let key = KeyPair::generate();
    let issued = Assertion::issue("banana", &key).unwrap();
    let parsed = Assertion::parse(issued.encoded()).unwrap();

    assert_eq!(parsed.encoded(), issued.encoded());
    assert_eq!(parsed.user(), "banana");
}

#[test]
fn test_published_key_text_form_verifies() {
    let key = KeyPair::generate();
    let assertion = Assertion::issue("banana", &key).unwrap();

    // the key as a relying party would receive it: base64url text
    let text = key.public_key().to_base64();
    let restored = PublicKey::from_base64(&text).unwrap();
    assert_eq!(assertion.verify(&restored).unwrap(), "banana");
}
