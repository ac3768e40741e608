//! Error types for accountd-core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid assertion: {0}")]
    InvalidAssertion(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}
