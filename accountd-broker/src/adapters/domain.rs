//! Domain verification via an IndieAuth authorization endpoint
//!
//! The claimed identifier is a bare domain; proving control means
//! completing an IndieAuth authorization for `https://<domain>/` at the
//! configured endpoint. The endpoint's `me` answer must resolve back to
//! the claimed host.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{Adapter, BeginAction, CallbackInput, FlowContext};
use crate::error::BrokerError;

const STATE_KEY: &str = "indieauth:state";

pub struct DomainAdapter;

#[derive(Deserialize)]
struct AuthResponse {
    me: String,
}

fn protocol_err(err: reqwest::Error) -> BrokerError {
    BrokerError::AdapterProtocol(format!("indieauth: {err}"))
}

#[async_trait]
impl Adapter for DomainAdapter {
    fn name(&self) -> &'static str {
        "domain"
    }

    async fn begin(&self, ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError> {
        let state = Uuid::new_v4().simple().to_string();
        ctx.secrets.insert(STATE_KEY.to_string(), state.clone());

        let me = format!("https://{}/", ctx.claimed);
        let redirect_uri = ctx.callback_url("domain");
        let url = reqwest::Url::parse_with_params(
            &ctx.config.indieauth_endpoint,
            &[
                ("me", me.as_str()),
                ("client_id", ctx.config.service_url.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| BrokerError::Internal(e.to_string()))?;

        Ok(BeginAction::Redirect(url.into()))
    }

    async fn complete(
        &self,
        ctx: &mut FlowContext<'_>,
        input: &CallbackInput,
    ) -> Result<String, BrokerError> {
        let expected_state = ctx.secrets.remove(STATE_KEY);
        match (expected_state.as_deref(), input.param("state")) {
            (Some(expected), Some(got)) if expected == got => {}
            _ => return Err(BrokerError::NonceMismatch),
        }

        let code = input
            .param("code")
            .ok_or_else(|| BrokerError::AdapterProtocol("indieauth: no code returned".into()))?;

        let redirect_uri = ctx.callback_url("domain");
        let response: AuthResponse = ctx
            .http
            .post(&ctx.config.indieauth_endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("code", code),
                ("client_id", ctx.config.service_url.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(protocol_err)?
            .json()
            .await
            .map_err(protocol_err)?;

        let me = reqwest::Url::parse(&response.me)
            .map_err(|e| BrokerError::AdapterProtocol(format!("indieauth: bad me url: {e}")))?;
        let verified_host = me
            .host_str()
            .ok_or_else(|| BrokerError::AdapterProtocol("indieauth: me url has no host".into()))?;

        if !verified_host.eq_ignore_ascii_case(ctx.claimed) {
            return Err(BrokerError::IdentityMismatch {
                claimed: ctx.claimed.to_string(),
            });
        }

        Ok(ctx.claimed.to_string())
    }
}
