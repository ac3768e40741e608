//! Shared test setup

use std::sync::Arc;

use accountd_broker::routes::create_router;
use accountd_broker::store::{InMemoryEphemeralStore, InMemoryLinkStore};
use accountd_broker::{AppState, Config};
use accountd_core::KeyPair;
use axum_test::TestServer;

pub type TestState = Arc<AppState<InMemoryLinkStore, InMemoryEphemeralStore>>;

pub fn test_config() -> Config {
    Config {
        service_url: "http://localhost:3000".to_string(),
        testing: true,
        ..Config::default()
    }
}

/// A broker on in-memory stores with the loopback `test` provider
/// enabled, plus a handle on its state for seeding and inspection.
pub fn create_test_server() -> (TestServer, TestState) {
    let state = Arc::new(
        AppState::new(
            test_config(),
            KeyPair::generate(),
            InMemoryLinkStore::new(),
            InMemoryEphemeralStore::new(),
        )
        .unwrap(),
    );

    let mut server = TestServer::new(create_router(state.clone())).unwrap();
    server.save_cookies();
    (server, state)
}

/// Strip the service origin so a redirect target can be requested
/// against the test server.
pub fn local_path(location: &str) -> String {
    location
        .strip_prefix("http://localhost:3000")
        .unwrap_or(location)
        .to_string()
}
