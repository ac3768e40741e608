//! Assertion verification and code redemption

use std::sync::Arc;

use accountd_core::Assertion;
use axum::extract::{Form, Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use crate::codes::redeem_code;
use crate::error::BrokerError;
use crate::state::AppState;
use crate::store::{EphemeralStore, LinkStore};

/// Check a presented assertion against the broker's own key.
/// Convenience for relying parties that would rather not verify
/// signatures themselves.
pub async fn verify<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let assertion = Assertion::parse(&token)?;
    let user = assertion.verify(&state.keypair.public_key())?;
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct RedeemForm {
    pub code: String,
}

/// Exchange a one-time code for the user it was issued to, plus a
/// signed assertion for onward use.
pub async fn redeem<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    Form(form): Form<RedeemForm>,
) -> Result<Json<serde_json::Value>, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let user = redeem_code(&state.flows, &form.code)?;
    let assertion = Assertion::issue(&user, &state.keypair)?;
    Ok(Json(json!({
        "user": user,
        "token": assertion.encoded(),
    })))
}
