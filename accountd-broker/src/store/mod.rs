//! Storage abstractions for the broker
//!
//! Two seams: the durable account graph and an expiring key/value
//! store carrying flow state and exchange codes. All cross-request
//! state lives behind these traits; nothing else is shared between
//! requests.

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryEphemeralStore, InMemoryLinkStore};
pub use models::{AccountLink, InsertOutcome};
pub use sqlite::SqliteLinkStore;

use crate::error::BrokerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, BrokerError>;

/// Durable account graph: identifier → user, identifier unique
pub trait LinkStore: Send + Sync {
    /// The link owning this identifier, if any
    fn link_for(&self, account: &str) -> StoreResult<Option<AccountLink>>;

    /// All links owned by a user, in creation order
    fn links_for_user(&self, user: &str) -> StoreResult<Vec<AccountLink>>;

    /// Create a link. A uniqueness violation is reported as a
    /// `Conflict` outcome, never surfaced as a fatal error.
    fn insert(&self, account: &str, user: &str) -> StoreResult<InsertOutcome>;

    /// Move an existing link to another user (insert if absent). The
    /// only operation that mutates an existing link; callers must have
    /// checked ownership first.
    fn repoint(&self, account: &str, user: &str) -> StoreResult<()>;

    /// Resolve a user handle or identifier to the owning user and all
    /// of their links, in creation order.
    fn resolve(&self, name: &str) -> StoreResult<Option<(String, Vec<AccountLink>)>>;
}

/// Expiring key/value storage for flow state and exchange codes
pub trait EphemeralStore: Send + Sync {
    fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomic read-and-invalidate: at most one caller ever sees a value
    fn get_and_delete(&self, key: &str) -> StoreResult<Option<String>>;

    fn delete(&self, key: &str) -> StoreResult<()>;
}
