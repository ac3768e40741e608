//! GitHub OAuth2 adapter
//!
//! Standard authorization-code handshake against github.com, with a
//! random `state` nonce held in the flow secrets. The verified identity
//! is the GitHub login, which must match the local part of the claimed
//! identifier exactly.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{Adapter, BeginAction, CallbackInput, FlowContext};
use crate::error::BrokerError;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";

const STATE_KEY: &str = "github:state";

pub struct GithubAdapter;

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    login: String,
}

fn protocol_err(err: reqwest::Error) -> BrokerError {
    BrokerError::AdapterProtocol(format!("github: {err}"))
}

#[async_trait]
impl Adapter for GithubAdapter {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn begin(&self, ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError> {
        let state = Uuid::new_v4().simple().to_string();
        ctx.secrets.insert(STATE_KEY.to_string(), state.clone());

        let redirect_uri = ctx.callback_url("github");
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", ctx.config.github.key.as_str()),
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
            .ok_or_else(|| BrokerError::AdapterProtocol("github: no code returned".into()))?;

        let token: AccessTokenResponse = ctx
            .http
            .post(ACCESS_TOKEN_URL)
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "client_id": ctx.config.github.key,
                "client_secret": ctx.config.github.secret,
                "code": code,
            }))
            .send()
            .await
            .map_err(protocol_err)?
            .json()
            .await
            .map_err(protocol_err)?;

        let access_token = token
            .access_token
            .ok_or_else(|| BrokerError::AdapterProtocol("github: no access token".into()))?;

        let user: GithubUser = ctx
            .http
            .get(USER_URL)
            .header("User-Agent", "accountd")
            .header("Authorization", format!("token {access_token}"))
            .send()
            .await
            .map_err(protocol_err)?
            .json()
            .await
            .map_err(protocol_err)?;

        if user.login != ctx.claimed_local() {
            return Err(BrokerError::IdentityMismatch {
                claimed: ctx.claimed.to_string(),
            });
        }

        Ok(ctx.claimed.to_string())
    }
}
