//! Signed user assertions
//!
//! An assertion is the broker's statement "this visitor is user X",
//! signed with the broker's key. It is shaped like a compact JWT
//! (`header.claims.signature`) so relying parties can decode it with
//! ordinary tooling. Assertions carry no expiry: they are handed to the
//! redirect target for immediate single use, and a compromised signing
//! key is handled by key rotation, not revocation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::{Error, KeyPair, PublicKey, Result};

const HEADER: &str = r#"{"alg":"EdDSA","typ":"JWT"}"#;

/// Claims carried by a user assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// The resolved user handle
    pub user: String,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// A signed statement of the resolved user handle
#[derive(Debug, Clone)]
pub struct Assertion {
    encoded: String,
    claims: AssertionClaims,
}

impl Assertion {
    /// Sign a new assertion for `user`. Ed25519 is deterministic: the
    /// same user and key always produce the same assertion.
    pub fn issue(user: &str, key: &KeyPair) -> Result<Self> {
        let claims = AssertionClaims {
            user: user.to_string(),
        };

        let header_b64 = URL_SAFE_NO_PAD.encode(HEADER);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_string(&claims)?);

        let message = format!("{}.{}", header_b64, claims_b64);
        let sig_b64 = URL_SAFE_NO_PAD.encode(key.sign(message.as_bytes()));

        Ok(Self {
            encoded: format!("{}.{}", message, sig_b64),
            claims,
        })
    }

    /// Parse an assertion from its encoded form (does not verify the
    /// signature — nothing parsed here may be trusted yet)
    pub fn parse(encoded: &str) -> Result<Self> {
        let (_, claims_b64, _) = split_parts(encoded)?;
        let claims_bytes = URL_SAFE_NO_PAD.decode(claims_b64)?;
        let claims: AssertionClaims = serde_json::from_slice(&claims_bytes)?;
        Ok(Self {
            encoded: encoded.to_string(),
            claims,
        })
    }

    /// Verify the signature and algorithm, returning the asserted user.
    ///
    /// Exactly one scheme is accepted; any header carrying another
    /// algorithm is rejected outright rather than partially trusted.
    pub fn verify(&self, public_key: &PublicKey) -> Result<&str> {
        let (header_b64, claims_b64, sig_b64) = split_parts(&self.encoded)?;

        let header_bytes = URL_SAFE_NO_PAD.decode(header_b64)?;
        let header: Header = serde_json::from_slice(&header_bytes)?;
        if header.alg != "EdDSA" {
            return Err(Error::UnsupportedAlgorithm(header.alg));
        }

        let message = format!("{}.{}", header_b64, claims_b64);
        let signature = URL_SAFE_NO_PAD.decode(sig_b64)?;
        public_key.verify(message.as_bytes(), &signature)?;

        Ok(&self.claims.user)
    }

    /// The asserted user handle (untrusted until `verify` succeeds)
    pub fn user(&self) -> &str {
        &self.claims.user
    }

    /// The encoded compact form
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

fn split_parts(encoded: &str) -> Result<(&str, &str, &str)> {
    let parts: Vec<&str> = encoded.split('.').collect();
    match parts[..] {
        [header, claims, sig] => Ok((header, claims, sig)),
        _ => Err(Error::InvalidAssertion("expected 3 JWT parts".into())),
    }
}
