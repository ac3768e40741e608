//! Identifier classification
//!
//! Maps a raw identifier string to the verification method that can
//! prove control of it. Classification is total over syntactically
//! valid identifiers, idempotent, and touches neither the network nor
//! any store.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d+$").unwrap());
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").unwrap());

/// Verification method for an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `+` followed by digits only
    Phone,
    /// Bare domain, e.g. `example.com`
    Domain,
    /// `local@domain.tld`
    Email,
    /// Third-party account provider, e.g. `github` in `alice@github`
    Silo(String),
}

impl Method {
    /// Wire tag for this method: `phone`, `domain`, `email`, or the
    /// silo provider name
    pub fn tag(&self) -> &str {
        match self {
            Method::Phone => "phone",
            Method::Domain => "domain",
            Method::Email => "email",
            Method::Silo(provider) => provider,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classify a raw identifier into its verification method.
///
/// Precedence: phone pattern, then bare domain, then split on the last
/// `@` — a dotted segment after the `@` is an email domain, an undotted
/// one is a silo provider name. The ordering makes `a@b.c` an email
/// even though it also looks like a silo handle.
pub fn classify(identifier: &str) -> Result<Method> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(Error::InvalidIdentifier("empty identifier".into()));
    }

    if PHONE_RE.is_match(identifier) {
        return Ok(Method::Phone);
    }

    match identifier.rsplit_once('@') {
        None if identifier.contains('.') => Ok(Method::Domain),
        None => Err(Error::InvalidIdentifier(format!(
            "cannot classify {identifier:?}"
        ))),
        Some((local, provider)) => {
            if local.is_empty() || provider.is_empty() {
                return Err(Error::InvalidIdentifier(format!(
                    "cannot classify {identifier:?}"
                )));
            }
            if provider.contains('.') {
                Ok(Method::Email)
            } else {
                Ok(Method::Silo(provider.to_string()))
            }
        }
    }
}

/// Check a user handle against the allowed `^[a-z0-9_]+$` syntax.
pub fn username_valid(user: &str) -> bool {
    USERNAME_RE.is_match(user)
}

/// Local part of an identifier: `alice` in `alice@github`. Identifiers
/// without an `@` are their own local part.
pub fn local_part(identifier: &str) -> &str {
    identifier
        .rsplit_once('@')
        .map(|(local, _)| local)
        .unwrap_or(identifier)
}
