//! Shared application state

use std::time::Duration;

use accountd_core::KeyPair;

use crate::adapters::AdapterRegistry;
use crate::config::Config;
use crate::error::BrokerError;
use crate::store::{EphemeralStore, LinkStore};

/// Application state shared across request handlers, generic over the
/// durable account graph and the ephemeral flow store
pub struct AppState<L: LinkStore, F: EphemeralStore> {
    pub config: Config,
    pub keypair: KeyPair,
    pub links: L,
    pub flows: F,
    pub http: reqwest::Client,
    pub adapters: AdapterRegistry,
}

impl<L: LinkStore, F: EphemeralStore> AppState<L, F> {
    pub fn new(config: Config, keypair: KeyPair, links: L, flows: F) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BrokerError::Internal(e.to_string()))?;
        let adapters = AdapterRegistry::new(&config);

        Ok(Self {
            config,
            keypair,
            links,
            flows,
            http,
            adapters,
        })
    }
}
