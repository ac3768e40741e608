//! Login entry point
//!
//! Classifies the claimed identifier, picks the matching adapter, and
//! sends the visitor out to the external verifier. The flow state is
//! saved before the response leaves, so the callback can pick it up.

use std::sync::Arc;

use accountd_core::{classify, username_valid};
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tower_cookies::Cookies;

use super::session::ensure_session_token;
use crate::adapters::{BeginAction, FlowContext};
use crate::error::BrokerError;
use crate::flow::{load_flow, save_flow, ResponseMode};
use crate::state::AppState;
use crate::store::{EphemeralStore, LinkStore};

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// Identifier to verify
    pub account: Option<String>,
    /// Desired user handle; absent means "resolve the identifier"
    pub user: Option<String>,
    /// Where to deliver the result
    pub redirect_uri: Option<String>,
    /// `token` (default) or `code`
    pub response_mode: Option<String>,
    /// Identifier a verified alternate will authorize
    pub initial_account: Option<String>,
}

pub async fn login<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    cookies: Cookies,
    Query(params): Query<LoginParams>,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let account = params
        .account
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| BrokerError::Classification("no account supplied".into()))?;

    if let Some(user) = params.user.as_deref() {
        if !username_valid(user) {
            return Err(BrokerError::InvalidUsername);
        }
    }
    if let Some(redirect_uri) = params.redirect_uri.as_deref() {
        reqwest::Url::parse(redirect_uri).map_err(|_| BrokerError::InvalidRedirectUri)?;
    }

    let method = classify(account)?;
    let adapter = state.adapters.resolve(&method)?;

    let token = ensure_session_token(&cookies);

    // Carry the existing flow forward so identifiers verified earlier
    // in this session keep counting.
    let mut flow = load_flow(&state.flows, &token)?.unwrap_or_default();

    if params.user.is_some() {
        flow.desired_user = params.user.clone();
    }
    if params.redirect_uri.is_some() {
        flow.redirect_uri = params.redirect_uri.clone();
    }
    // An initial_account from the query only counts once this session
    // has verified it; until then it is just a claim.
    if let Some(initial) = params.initial_account.as_deref() {
        if flow.authorized.iter().any(|a| a == initial) {
            flow.initial_account = Some(initial.to_string());
        }
    }
    match params.response_mode.as_deref() {
        Some("code") => flow.response_mode = ResponseMode::Code,
        Some("token") => flow.response_mode = ResponseMode::Token,
        Some(other) => {
            return Err(BrokerError::Classification(format!(
                "unknown response_mode {other:?}"
            )))
        }
        None => {}
    }

    flow.begin_verification(account);

    tracing::info!(account, method = %method, "starting verification");

    let mut ctx = FlowContext {
        http: &state.http,
        config: &state.config,
        claimed: account,
        secrets: &mut flow.secrets,
    };
    let action = adapter.begin(&mut ctx).await;

    // Save even on failure so consumed nonces never come back.
    save_flow(&state.flows, &token, &flow, state.config.session_ttl_secs)?;

    Ok(match action? {
        BeginAction::Redirect(url) => Redirect::to(&url).into_response(),
        BeginAction::Page(body) => Html(body).into_response(),
    })
}
