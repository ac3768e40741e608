//! Explicit link confirmation
//!
//! Resolves a contested identifier after the visitor has verified an
//! alternate. Every piece of the request is checked against the flow
//! this session actually ran; nothing here trusts the URL alone.

use std::sync::Arc;

use accountd_core::username_valid;
use axum::extract::{Path, State};
use axum::response::Response;
use tower_cookies::Cookies;

use super::callback::deliver_result;
use super::session::session_token;
use crate::error::BrokerError;
use crate::flow::{clear_flow, load_flow};
use crate::state::AppState;
use crate::store::{EphemeralStore, LinkStore};

pub async fn link<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    cookies: Cookies,
    Path((account, user, alt)): Path<(String, String, String)>,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let token = session_token(&cookies).ok_or(BrokerError::FlowExpired)?;
    let flow = load_flow(&state.flows, &token)?.ok_or(BrokerError::FlowExpired)?;

    if !username_valid(&user) {
        return Err(BrokerError::InvalidUsername);
    }

    // The contested identifier must itself have been verified in this
    // session. A flow merely claiming it is not enough.
    if !flow.authorized.iter().any(|a| a == &account) {
        return Err(BrokerError::SessionMismatch);
    }

    // The alternate must have been verified in this session.
    if !flow.authorized.iter().any(|a| a == &alt) {
        return Err(BrokerError::SessionMismatch);
    }

    // The alternate must vouch for someone with standing: either the
    // identifier's current owner, or the user taking it over.
    let alt_owner = state
        .links
        .link_for(&alt)?
        .ok_or(BrokerError::SessionMismatch)?
        .user;
    let current_owner = state.links.link_for(&account)?.map(|l| l.user);
    let has_standing =
        alt_owner == user || current_owner.as_deref() == Some(alt_owner.as_str());
    if !has_standing {
        return Err(BrokerError::SessionMismatch);
    }

    state.links.repoint(&account, &user)?;
    tracing::info!(account, user, alt, "identifier re-linked");

    let response = deliver_result(&state, &flow, &user)?;
    clear_flow(&state.flows, &token)?;
    Ok(response)
}
