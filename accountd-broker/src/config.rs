//! Broker configuration
//!
//! Everything comes from the environment, matching how the broker is
//! deployed. Provider credential pairs are externally supplied; the
//! broker never persists them anywhere else.

use std::env;
use std::fs;
use std::path::Path;

use accountd_core::KeyPair;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Public base URL of this broker, no trailing slash
    pub service_url: String,

    /// Port to listen on
    pub port: u16,

    /// Where the signing key seed lives
    pub key_file: String,

    /// SQLite database path for the account graph
    pub database_path: String,

    /// Enables the `test` provider; never set in production
    pub testing: bool,

    /// Lifetime of a visitor's flow state
    pub session_ttl_secs: u64,

    /// IndieAuth-style authorization endpoint for domain verification
    pub indieauth_endpoint: String,

    /// Portier-compatible broker for email verification
    pub portier_broker: String,

    pub github: ProviderKeys,
    pub trello: ProviderKeys,
    pub twitter: ProviderKeys,
}

/// A client id/secret (or consumer key/secret) pair for one provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderKeys {
    pub key: String,
    pub secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:3000".to_string(),
            port: 3000,
            key_file: "accountd.key".to_string(),
            database_path: "accountd.db".to_string(),
            testing: false,
            session_ttl_secs: 3600,
            indieauth_endpoint: "https://indieauth.com/auth".to_string(),
            portier_broker: "https://broker.portier.io".to_string(),
            github: ProviderKeys::default(),
            trello: ProviderKeys::default(),
            twitter: ProviderKeys::default(),
        }
    }
}

impl Config {
    /// Build a configuration from environment variables, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Self {
        let default = Config::default();
        Self {
            service_url: env::var("SERVICE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(default.service_url),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(default.port),
            key_file: env::var("KEY_FILE").unwrap_or(default.key_file),
            database_path: env::var("DATABASE_PATH").unwrap_or(default.database_path),
            testing: env::var("TESTING")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default.testing),
            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_ttl_secs),
            indieauth_endpoint: env::var("INDIEAUTH_ENDPOINT")
                .unwrap_or(default.indieauth_endpoint),
            portier_broker: env::var("PORTIER_BROKER").unwrap_or(default.portier_broker),
            github: provider_keys("GITHUB"),
            trello: provider_keys("TRELLO"),
            twitter: provider_keys("TWITTER"),
        }
    }
}

fn provider_keys(prefix: &str) -> ProviderKeys {
    ProviderKeys {
        key: env::var(format!("{prefix}_KEY")).unwrap_or_default(),
        secret: env::var(format!("{prefix}_SECRET")).unwrap_or_default(),
    }
}

/// Load the broker keypair from `path`, generating and persisting a
/// fresh one when the file does not exist yet.
pub fn load_or_generate_keypair(path: &str) -> anyhow::Result<KeyPair> {
    if Path::new(path).exists() {
        let encoded = fs::read_to_string(path)?;
        let seed = URL_SAFE_NO_PAD.decode(encoded.trim())?;
        Ok(KeyPair::from_seed(&seed)?)
    } else {
        let keypair = KeyPair::generate();
        fs::write(path, URL_SAFE_NO_PAD.encode(keypair.secret_bytes()))?;
        tracing::info!(path, "Generated new signing keypair");
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_persists_across_loads() {
        let dir = std::env::temp_dir().join(format!("accountd-key-{}", std::process::id()));
        let path = dir.to_str().unwrap();

        let first = load_or_generate_keypair(path).unwrap();
        let second = load_or_generate_keypair(path).unwrap();
        assert_eq!(first.public_key(), second.public_key());

        let _ = fs::remove_file(path);
    }
}
