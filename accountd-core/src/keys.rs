//! The broker's signing keys
//!
//! Ed25519 throughout. The private half never leaves the broker; the
//! public half is published as base64url text for relying parties.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::{Error, Result};

/// A public key that can verify broker signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("public key must be 32 bytes".into()))?;
        let inner =
            VerifyingKey::from_bytes(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Encode as base64url (no padding)
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.inner.as_bytes())
    }

    /// Decode from base64url
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(s.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Verify a signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| Error::InvalidKey("signature must be 64 bytes".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);
        self.inner
            .verify(message, &signature)
            .map_err(|_| Error::SignatureVerificationFailed)
    }
}

/// The broker's keypair
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from a stored 32-byte seed
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::InvalidKey("seed must be 32 bytes".into()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// The verifying half
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.signing_key.verifying_key(),
        }
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }

    /// The seed bytes, for persisting the key between runs
    pub fn secret_bytes(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let signature = kp.sign(b"hello world");
        kp.public_key().verify(b"hello world", &signature).unwrap();
    }

    #[test]
    fn test_corrupted_signature_rejected() {
        let kp = KeyPair::generate();
        let mut signature = kp.sign(b"hello world");
        signature[0] ^= 0xff;
        assert!(kp.public_key().verify(b"hello world", &signature).is_err());
    }

    #[test]
    fn test_seed_roundtrip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_seed(kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_public_key_base64_roundtrip() {
        let pk = KeyPair::generate().public_key();
        let decoded = PublicKey::from_base64(&pk.to_base64()).unwrap();
        assert_eq!(pk, decoded);
    }
}
