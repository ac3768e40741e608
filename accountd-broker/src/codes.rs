//! One-time exchange codes
//!
//! Stand-ins for an assertion when the calling application cannot take
//! a token in a redirect query parameter. Codes live in the ephemeral
//! store with a fixed TTL; redemption is a single read-and-invalidate,
//! and a miss never says whether the code was expired, redeemed or
//! simply never issued.

use uuid::Uuid;

use crate::error::BrokerError;
use crate::store::EphemeralStore;

/// How long an issued code stays redeemable
pub const CODE_TTL_SECS: u64 = 180;

fn code_key(code: &str) -> String {
    format!("code:{code}")
}

/// Issue a fresh single-use code for `user`.
pub fn issue_code<F: EphemeralStore>(store: &F, user: &str) -> Result<String, BrokerError> {
    let code = Uuid::new_v4().simple().to_string();
    store.set_with_expiry(&code_key(&code), user, CODE_TTL_SECS)?;
    Ok(code)
}

/// Redeem a code for its user. Succeeds at most once per issued code.
pub fn redeem_code<F: EphemeralStore>(store: &F, code: &str) -> Result<String, BrokerError> {
    store
        .get_and_delete(&code_key(code))?
        .ok_or(BrokerError::CodeExpiredOrUnknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEphemeralStore;

    #[test]
    fn test_code_redeems_exactly_once() {
        let store = InMemoryEphemeralStore::new();
        let code = issue_code(&store, "banana").unwrap();

        assert_eq!(redeem_code(&store, &code).unwrap(), "banana");
        assert!(matches!(
            redeem_code(&store, &code),
            Err(BrokerError::CodeExpiredOrUnknown)
        ));
    }

    #[test]
    fn test_unknown_and_expired_codes_look_alike() {
        let store = InMemoryEphemeralStore::new();

        let unknown = redeem_code(&store, "never-issued");
        assert!(matches!(unknown, Err(BrokerError::CodeExpiredOrUnknown)));

        let code = issue_code(&store, "banana").unwrap();
        store.force_expire(&format!("code:{code}"));
        let expired = redeem_code(&store, &code);
        assert!(matches!(expired, Err(BrokerError::CodeExpiredOrUnknown)));
    }

    #[test]
    fn test_codes_are_unique() {
        let store = InMemoryEphemeralStore::new();
        let a = issue_code(&store, "banana").unwrap();
        let b = issue_code(&store, "banana").unwrap();
        assert_ne!(a, b);
    }
}
