//! Accountd Core Library
//!
//! The pure parts of the accountd identity broker:
//! - Classification of raw identifiers into verification methods
//! - The broker's Ed25519 signing keys
//! - Signed `{user}` assertions, verifiable offline by anyone holding
//!   the broker's public key

pub mod assertion;
pub mod error;
pub mod ident;
pub mod keys;

pub use assertion::Assertion;
pub use error::Error;
pub use ident::{classify, local_part, username_valid, Method};
pub use keys::{KeyPair, PublicKey};

/// Result type for accountd-core operations
pub type Result<T> = std::result::Result<T, Error>;
