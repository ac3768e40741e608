//! Provider callback
//!
//! The return half of every verification handshake. Confirms the
//! callback belongs to the flow this session actually started, lets the
//! adapter finish its protocol, then reconciles the verified identifier
//! against the account graph and delivers whatever comes out: a signed
//! assertion, a prompt, or another round of verification.

use std::collections::HashMap;
use std::sync::Arc;

use accountd_core::{classify, Assertion};
use axum::extract::{Form, Path, Query, State};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde_json::json;
use tower_cookies::Cookies;

use super::session::session_token;
use crate::adapters::{CallbackInput, FlowContext};
use crate::codes::issue_code;
use crate::error::BrokerError;
use crate::flow::{clear_flow, load_flow, save_flow, FlowStage, FlowState, ResponseMode};
use crate::reconcile::{reconcile, Reconciliation};
use crate::state::AppState;
use crate::store::{EphemeralStore, LinkStore};

pub async fn callback_get<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    cookies: Cookies,
    Path(provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    handle_callback(state, cookies, provider, CallbackInput::from_query(query)).await
}

pub async fn callback_post<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    cookies: Cookies,
    Path(provider): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    handle_callback(state, cookies, provider, CallbackInput::from_form(form)).await
}

async fn handle_callback<L, F>(
    state: Arc<AppState<L, F>>,
    cookies: Cookies,
    provider: String,
    input: CallbackInput,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let token = session_token(&cookies).ok_or(BrokerError::FlowExpired)?;
    let mut flow = load_flow(&state.flows, &token)?.ok_or(BrokerError::FlowExpired)?;

    let account = flow.expect_awaiting()?.to_string();
    let method = classify(&account)?;
    let adapter = state.adapters.resolve(&method)?;

    // A callback from a provider other than the one this flow went out
    // to is not resumable.
    if adapter.name() != provider {
        return Err(BrokerError::SessionMismatch);
    }

    let mut ctx = FlowContext {
        http: &state.http,
        config: &state.config,
        claimed: &account,
        secrets: &mut flow.secrets,
    };
    let verified = match adapter.complete(&mut ctx, &input).await {
        Ok(verified) => verified,
        Err(err) => {
            // Fail closed: a broken handshake invalidates the whole flow.
            clear_flow(&state.flows, &token)?;
            return Err(err);
        }
    };

    if verified != account {
        clear_flow(&state.flows, &token)?;
        return Err(BrokerError::IdentityMismatch { claimed: account });
    }

    tracing::info!(account, "identifier verified");

    flow.stage = FlowStage::Idle;
    flow.mark_authorized(&account);

    // A pending initial_account means this verification was the
    // alternate authorizing it; reconcile the original identifier.
    // Only if it was itself verified earlier in this session, though:
    // anything else is an unverified claim and gets dropped.
    let account_for_link = match flow.initial_account.take() {
        Some(initial) if flow.authorized.iter().any(|a| a == &initial) => initial,
        _ => account.clone(),
    };
    let desired = flow.desired_user.clone();

    let outcome = reconcile(
        &state.links,
        desired.as_deref(),
        &account_for_link,
        &flow.authorized,
    )?;

    match outcome {
        Reconciliation::Linked { user } | Reconciliation::Resolved { user } => {
            let response = deliver_result(&state, &flow, &user)?;
            clear_flow(&state.flows, &token)?;
            tracing::info!(user, account = account_for_link, "flow complete");
            Ok(response)
        }

        Reconciliation::NeedsUsername => {
            save_flow(&state.flows, &token, &flow, state.config.session_ttl_secs)?;
            Ok(Json(json!({
                "status": "choose_username",
                "account": account_for_link,
            }))
            .into_response())
        }

        Reconciliation::OwnershipConflict { existing_user } => {
            let alternatives: Vec<String> = state
                .links
                .links_for_user(&existing_user)?
                .into_iter()
                .map(|l| l.account)
                .filter(|a| a != &account_for_link)
                .collect();

            flow.initial_account = Some(account_for_link.clone());
            flow.enter_disambiguation();
            save_flow(&state.flows, &token, &flow, state.config.session_ttl_secs)?;

            Ok(Json(json!({
                "status": "conflict",
                "account": account_for_link,
                "existing_user": existing_user,
                "alternatives": alternatives,
            }))
            .into_response())
        }

        Reconciliation::NeedsAlternate { alternates } => {
            flow.initial_account = Some(account_for_link.clone());

            if let [alt] = alternates.as_slice() {
                // Exactly one candidate: send the visitor straight out
                // to verify it.
                save_flow(&state.flows, &token, &flow, state.config.session_ttl_secs)?;
                let mut target = format!(
                    "/login?account={}&initial_account={}",
                    urlencoding::encode(alt),
                    urlencoding::encode(&account_for_link),
                );
                if let Some(user) = &desired {
                    target.push_str(&format!("&user={}", urlencoding::encode(user)));
                }
                return Ok(Redirect::to(&target).into_response());
            }

            flow.enter_disambiguation();
            save_flow(&state.flows, &token, &flow, state.config.session_ttl_secs)?;
            Ok(Json(json!({
                "status": "disambiguate",
                "account": account_for_link,
                "alternatives": alternates,
            }))
            .into_response())
        }
    }
}

/// Hand the resolved user back to the caller, as a redirect when a
/// `redirect_uri` was registered, otherwise in the response body.
pub(super) fn deliver_result<L, F>(
    state: &AppState<L, F>,
    flow: &FlowState,
    user: &str,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let (param, credential) = match flow.response_mode {
        ResponseMode::Token => (
            "token",
            Assertion::issue(user, &state.keypair)?.encoded().to_string(),
        ),
        ResponseMode::Code => ("code", issue_code(&state.flows, user)?),
    };

    match &flow.redirect_uri {
        Some(redirect_uri) => {
            let mut url = reqwest::Url::parse(redirect_uri)
                .map_err(|_| BrokerError::InvalidRedirectUri)?;
            url.query_pairs_mut().append_pair(param, &credential);
            Ok(Redirect::to(url.as_str()).into_response())
        }
        None => Ok(credential.into_response()),
    }
}
