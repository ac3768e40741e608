//! HTTP route handlers

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_cookies::CookieManagerLayer;

use crate::state::AppState;
use crate::store::{EphemeralStore, LinkStore};

mod callback;
mod link;
mod login;
mod lookup;
mod session;
mod verify;

pub use session::SESSION_COOKIE;

/// Build the complete broker router
pub fn create_router<L, F>(state: Arc<AppState<L, F>>) -> Router
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login::login))
        .route(
            "/callback/from/{provider}",
            get(callback::callback_get).post(callback::callback_post),
        )
        .route("/link/{account}/on/{user}/with/{alt}", post(link::link))
        .route("/verify/{token}", post(verify::verify))
        .route("/redeem", post(verify::redeem))
        .route("/lookup/{name}", get(lookup::lookup))
        .route("/public-key", get(public_key))
        .layer(CookieManagerLayer::new())
        .with_state(state)
}

async fn landing() -> Json<serde_json::Value> {
    Json(json!({
        "service": "accountd",
        "login": "/login?account=<identifier>&user=<handle>",
    }))
}

/// The broker's verification key, for relying parties that check
/// assertions themselves
async fn public_key<L, F>(State(state): State<Arc<AppState<L, F>>>) -> Json<serde_json::Value>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    Json(json!({
        "alg": "EdDSA",
        "public_key": state.keypair.public_key().to_base64(),
    }))
}
