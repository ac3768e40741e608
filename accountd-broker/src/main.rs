//! accountd broker
//!
//! Identity-federation broker: verify control of identifiers, link
//! them to user handles, and hand relying parties a signed assertion.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accountd_broker::config::load_or_generate_keypair;
use accountd_broker::routes::create_router;
use accountd_broker::store::{InMemoryEphemeralStore, SqliteLinkStore};
use accountd_broker::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accountd_broker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    // Load or generate the signing keypair
    let keypair = load_or_generate_keypair(&config.key_file)?;
    tracing::info!(
        public_key = %keypair.public_key().to_base64(),
        "Loaded keypair"
    );

    // Open the stores
    let links = SqliteLinkStore::open(&config.database_path)?;
    let flows = InMemoryEphemeralStore::new();

    let port = config.port;
    let state = Arc::new(AppState::new(config, keypair, links, flows)?);
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Broker listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
