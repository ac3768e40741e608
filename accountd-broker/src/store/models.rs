//! Data models for broker storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable identifier-to-user binding. `account` is unique across
/// all links; a user may own many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    pub account: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
}

/// Result of attempting to create a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The identifier is already linked to `existing_user`
    Conflict { existing_user: String },
}
