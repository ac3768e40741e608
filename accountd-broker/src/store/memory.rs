//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::{AccountLink, EphemeralStore, InsertOutcome, LinkStore, StoreResult};

/// In-memory account graph. The backing `Vec` keeps creation order,
/// which the lookup surface exposes.
pub struct InMemoryLinkStore {
    links: RwLock<Vec<AccountLink>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self {
            links: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryLinkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStore for InMemoryLinkStore {
    fn link_for(&self, account: &str) -> StoreResult<Option<AccountLink>> {
        let links = self.links.read().unwrap();
        Ok(links.iter().find(|l| l.account == account).cloned())
    }

    fn links_for_user(&self, user: &str) -> StoreResult<Vec<AccountLink>> {
        let links = self.links.read().unwrap();
        Ok(links.iter().filter(|l| l.user == user).cloned().collect())
    }

    fn insert(&self, account: &str, user: &str) -> StoreResult<InsertOutcome> {
        let mut links = self.links.write().unwrap();
        if let Some(existing) = links.iter().find(|l| l.account == account) {
            return Ok(InsertOutcome::Conflict {
                existing_user: existing.user.clone(),
            });
        }
        links.push(AccountLink {
            account: account.to_string(),
            user: user.to_string(),
            created_at: Utc::now(),
        });
        Ok(InsertOutcome::Inserted)
    }

    fn repoint(&self, account: &str, user: &str) -> StoreResult<()> {
        let mut links = self.links.write().unwrap();
        if let Some(existing) = links.iter_mut().find(|l| l.account == account) {
            existing.user = user.to_string();
        } else {
            links.push(AccountLink {
                account: account.to_string(),
                user: user.to_string(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> StoreResult<Option<(String, Vec<AccountLink>)>> {
        let links = self.links.read().unwrap();
        let owner = links
            .iter()
            .find(|l| l.user == name || l.account == name)
            .map(|l| l.user.clone());
        Ok(owner.map(|user| {
            let owned = links.iter().filter(|l| l.user == user).cloned().collect();
            (user, owned)
        }))
    }
}

/// In-memory expiring key/value store
pub struct InMemoryEphemeralStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryEphemeralStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Force an entry to expire immediately (test support)
    pub fn force_expire(&self, key: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.1 = Instant::now();
        }
    }
}

impl Default for InMemoryEphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

fn expired(expires_at: Instant) -> bool {
    Instant::now() >= expires_at
}

impl EphemeralStore for InMemoryEphemeralStore {
    fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| !expired(*expires_at))
            .map(|(value, _)| value.clone()))
    }

    fn get_and_delete(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.write().unwrap();
        Ok(entries
            .remove(key)
            .filter(|(_, expires_at)| !expired(*expires_at))
            .map(|(value, _)| value))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}
