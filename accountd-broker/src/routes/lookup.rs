//! Public lookup of the account graph

use std::sync::Arc;

use accountd_core::classify;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::BrokerError;
use crate::state::AppState;
use crate::store::{EphemeralStore, LinkStore};

fn method_tag(account: &str) -> String {
    classify(account)
        .map(|m| m.tag().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Resolve a user handle or a linked identifier to the owning user and
/// all of their identifiers, in the order they were linked. An unknown
/// but classifiable identifier answers with its method, so callers can
/// tell "never registered" from "not an identifier at all".
pub async fn lookup<L, F>(
    State(state): State<Arc<AppState<L, F>>>,
    Path(name): Path<String>,
) -> Result<Response, BrokerError>
where
    L: LinkStore + 'static,
    F: EphemeralStore + 'static,
{
    let name = name.trim().to_lowercase();

    if let Some((user, links)) = state.links.resolve(&name)? {
        let accounts: Vec<serde_json::Value> = links
            .into_iter()
            .map(|l| json!({ "account": l.account, "type": method_tag(&l.account) }))
            .collect();
        return Ok(Json(json!({ "id": user, "accounts": accounts })).into_response());
    }

    match classify(&name) {
        Ok(method) => Ok(Json(json!({ "id": null, "type": method.tag() })).into_response()),
        Err(_) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "reason": "unknown user or account" })),
        )
            .into_response()),
    }
}
