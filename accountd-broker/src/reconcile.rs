//! Account-graph reconciliation
//!
//! Decides what to do with a freshly verified identifier: register it,
//! accept an existing link, surface an ownership conflict, or ask the
//! visitor to prove control of one of the user's other identifiers
//! first. No graph mutation ever happens before the identifier has
//! been verified, so every outcome here is safe to surface.

use crate::error::BrokerError;
use crate::store::{InsertOutcome, LinkStore};

/// Outcome of reconciling a verified identifier against the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The identifier is linked to the user (newly, or already was)
    Linked { user: String },

    /// No user was requested; the identifier's existing link names one
    Resolved { user: String },

    /// No user was requested and the identifier is unknown
    NeedsUsername,

    /// The identifier belongs to someone else and this session has not
    /// proven ownership of any of their other identifiers
    OwnershipConflict { existing_user: String },

    /// The user already owns identifiers; one of them must be verified
    /// before the new identifier can join. All candidates are listed —
    /// the caller never guesses.
    NeedsAlternate { alternates: Vec<String> },
}

/// Reconcile `(desired_user, account)` given the identifiers already
/// verified this session.
pub fn reconcile<L: LinkStore>(
    links: &L,
    desired_user: Option<&str>,
    account: &str,
    authorized: &[String],
) -> Result<Reconciliation, BrokerError> {
    let Some(user) = desired_user else {
        // No handle supplied: adopt whatever the graph already says.
        return match links.link_for(account)? {
            Some(link) => Ok(Reconciliation::Resolved { user: link.user }),
            None => Ok(Reconciliation::NeedsUsername),
        };
    };

    if let Some(existing) = links.link_for(account)? {
        return reconcile_existing(links, user, account, &existing.user, authorized);
    }

    let owned = links.links_for_user(user)?;
    if owned.is_empty() {
        // First identifier for this user. The store's unique constraint
        // is the backstop against a concurrent registration of the same
        // identifier; a conflict re-enters the ownership check.
        return match links.insert(account, user)? {
            InsertOutcome::Inserted => Ok(Reconciliation::Linked {
                user: user.to_string(),
            }),
            InsertOutcome::Conflict { existing_user } => {
                reconcile_existing(links, user, account, &existing_user, authorized)
            }
        };
    }

    // The user already owns identifiers: joining a new one requires
    // that one of them was verified in this same session.
    if owned
        .iter()
        .any(|l| authorized.iter().any(|a| a == &l.account))
    {
        return match links.insert(account, user)? {
            InsertOutcome::Inserted => Ok(Reconciliation::Linked {
                user: user.to_string(),
            }),
            InsertOutcome::Conflict { existing_user } => {
                reconcile_existing(links, user, account, &existing_user, authorized)
            }
        };
    }

    Ok(Reconciliation::NeedsAlternate {
        alternates: owned.into_iter().map(|l| l.account).collect(),
    })
}

/// The identifier already has a link. Idempotent success when it points
/// at the desired user; otherwise re-pointing requires proof that this
/// session controls one of the current owner's other identifiers.
fn reconcile_existing<L: LinkStore>(
    links: &L,
    user: &str,
    account: &str,
    existing_user: &str,
    authorized: &[String],
) -> Result<Reconciliation, BrokerError> {
    if existing_user == user {
        return Ok(Reconciliation::Linked {
            user: user.to_string(),
        });
    }

    let theirs = links.links_for_user(existing_user)?;
    let proven = theirs
        .iter()
        .any(|l| l.account != account && authorized.iter().any(|a| a == &l.account));

    if proven {
        links.repoint(account, user)?;
        return Ok(Reconciliation::Linked {
            user: user.to_string(),
        });
    }

    Ok(Reconciliation::OwnershipConflict {
        existing_user: existing_user.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLinkStore;

    fn authorized(accounts: &[&str]) -> Vec<String> {
        accounts.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_new_user_registers() {
        let links = InMemoryLinkStore::new();
        let outcome =
            reconcile(&links, Some("banana"), "banana@test", &authorized(&["banana@test"]))
                .unwrap();
        assert_eq!(
            outcome,
            Reconciliation::Linked {
                user: "banana".to_string()
            }
        );
        assert_eq!(links.link_for("banana@test").unwrap().unwrap().user, "banana");
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let links = InMemoryLinkStore::new();
        let auth = authorized(&["banana@test"]);

        reconcile(&links, Some("banana"), "banana@test", &auth).unwrap();
        let second = reconcile(&links, Some("banana"), "banana@test", &auth).unwrap();

        assert_eq!(
            second,
            Reconciliation::Linked {
                user: "banana".to_string()
            }
        );
        assert_eq!(links.links_for_user("banana").unwrap().len(), 1);
    }

    #[test]
    fn test_conflict_without_proof_prompts() {
        let links = InMemoryLinkStore::new();
        links.insert("a@test", "u1").unwrap();

        let outcome = reconcile(&links, Some("u2"), "a@test", &authorized(&["a@test"])).unwrap();

        assert_eq!(
            outcome,
            Reconciliation::OwnershipConflict {
                existing_user: "u1".to_string()
            }
        );
        // no mutation happened
        assert_eq!(links.link_for("a@test").unwrap().unwrap().user, "u1");
    }

    #[test]
    fn test_conflict_with_session_proof_repoints() {
        let links = InMemoryLinkStore::new();
        links.insert("a@test", "u1").unwrap();
        links.insert("b@test", "u1").unwrap();

        // this session verified b@test, one of u1's other identifiers
        let outcome =
            reconcile(&links, Some("u2"), "a@test", &authorized(&["b@test", "a@test"])).unwrap();

        assert_eq!(
            outcome,
            Reconciliation::Linked {
                user: "u2".to_string()
            }
        );
        assert_eq!(links.link_for("a@test").unwrap().unwrap().user, "u2");
        // the proof identifier stays where it was
        assert_eq!(links.link_for("b@test").unwrap().unwrap().user, "u1");
    }

    #[test]
    fn test_second_identifier_needs_alternate() {
        let links = InMemoryLinkStore::new();
        links.insert("b1@test", "banana").unwrap();

        let outcome =
            reconcile(&links, Some("banana"), "b2@test", &authorized(&["b2@test"])).unwrap();

        assert_eq!(
            outcome,
            Reconciliation::NeedsAlternate {
                alternates: vec!["b1@test".to_string()]
            }
        );
        assert!(links.link_for("b2@test").unwrap().is_none());
    }

    #[test]
    fn test_all_alternates_listed() {
        let links = InMemoryLinkStore::new();
        links.insert("b1@test", "banana").unwrap();
        links.insert("b2.com", "banana").unwrap();

        let outcome =
            reconcile(&links, Some("banana"), "b3@test", &authorized(&["b3@test"])).unwrap();

        assert_eq!(
            outcome,
            Reconciliation::NeedsAlternate {
                alternates: vec!["b1@test".to_string(), "b2.com".to_string()]
            }
        );
    }

    #[test]
    fn test_alternate_verified_links_new_identifier() {
        let links = InMemoryLinkStore::new();
        links.insert("b1@test", "banana").unwrap();

        let outcome = reconcile(
            &links,
            Some("banana"),
            "b2@test",
            &authorized(&["b2@test", "b1@test"]),
        )
        .unwrap();

        assert_eq!(
            outcome,
            Reconciliation::Linked {
                user: "banana".to_string()
            }
        );
        assert_eq!(links.links_for_user("banana").unwrap().len(), 2);
    }

    #[test]
    fn test_absent_user_adopts_existing_link() {
        let links = InMemoryLinkStore::new();
        links.insert("y@test", "zed").unwrap();

        let outcome = reconcile(&links, None, "y@test", &authorized(&["y@test"])).unwrap();
        assert_eq!(
            outcome,
            Reconciliation::Resolved {
                user: "zed".to_string()
            }
        );
    }

    #[test]
    fn test_absent_user_unknown_identifier_prompts() {
        let links = InMemoryLinkStore::new();
        let outcome = reconcile(&links, None, "x@test", &authorized(&["x@test"])).unwrap();
        assert_eq!(outcome, Reconciliation::NeedsUsername);
        assert!(links.link_for("x@test").unwrap().is_none());
    }

    #[test]
    fn test_identifier_uniqueness_holds_across_sequences() {
        let links = InMemoryLinkStore::new();
        let auth = authorized(&["a@test"]);

        reconcile(&links, Some("u1"), "a@test", &auth).unwrap();
        reconcile(&links, Some("u2"), "a@test", &auth).unwrap();
        reconcile(&links, Some("u1"), "a@test", &auth).unwrap();

        // at most one link for the identifier, whoever owns it
        assert_eq!(
            links
                .links_for_user("u1")
                .unwrap()
                .len()
                + links.links_for_user("u2").unwrap().len(),
            1
        );
    }
}
