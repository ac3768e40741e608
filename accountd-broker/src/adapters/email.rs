//! Email verification via a Portier-compatible broker
//!
//! Email delivery is delegated entirely to the configured Portier
//! broker. `begin` renders an auto-submitting form post to the broker's
//! auth endpoint; `complete` validates the RS256 id_token it posts
//! back, including issuer, audience, key id and our stored nonce. The
//! `sub` claim is the verified address.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use super::{Adapter, BeginAction, CallbackInput, FlowContext};
use crate::error::BrokerError;

const NONCE_KEY: &str = "portier:nonce";

pub struct EmailAdapter;

#[derive(Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: Option<String>,
    n: String,
    e: String,
}

#[derive(Deserialize)]
struct IdTokenClaims {
    /// The verified email address
    sub: String,
    nonce: Option<String>,
}

fn protocol_err(err: reqwest::Error) -> BrokerError {
    BrokerError::AdapterProtocol(format!("portier: {err}"))
}

impl EmailAdapter {
    /// Fetch the broker's RSA key for `kid` via OpenID discovery.
    async fn fetch_key(ctx: &FlowContext<'_>, kid: &str) -> Result<DecodingKey, BrokerError> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            ctx.config.portier_broker
        );
        let discovery: OpenIdConfig = ctx
            .http
            .get(&discovery_url)
            .send()
            .await
            .map_err(protocol_err)?
            .json()
            .await
            .map_err(protocol_err)?;

        let jwks: Jwks = ctx
            .http
            .get(&discovery.jwks_uri)
            .send()
            .await
            .map_err(protocol_err)?
            .json()
            .await
            .map_err(protocol_err)?;

        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid))
            .ok_or_else(|| BrokerError::AdapterProtocol("portier: unknown signing key".into()))?;

        DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| BrokerError::AdapterProtocol(format!("portier: bad jwk: {e}")))
    }
}

#[async_trait]
impl Adapter for EmailAdapter {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn begin(&self, ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError> {
        let nonce = Uuid::new_v4().simple().to_string();
        ctx.secrets.insert(NONCE_KEY.to_string(), nonce.clone());

        let auth_url = format!("{}/auth", ctx.config.portier_broker);
        let page = format!(
            concat!(
                "<!doctype html><html><body onload=\"document.forms[0].submit()\">",
                "<form method=\"post\" action=\"{action}\">",
                "<input type=\"hidden\" name=\"login_hint\" value=\"{login_hint}\">",
                "<input type=\"hidden\" name=\"scope\" value=\"openid email\">",
                "<input type=\"hidden\" name=\"nonce\" value=\"{nonce}\">",
                "<input type=\"hidden\" name=\"response_type\" value=\"id_token\">",
                "<input type=\"hidden\" name=\"response_mode\" value=\"form_post\">",
                "<input type=\"hidden\" name=\"client_id\" value=\"{client_id}\">",
                "<input type=\"hidden\" name=\"redirect_uri\" value=\"{redirect_uri}\">",
                "<noscript><button type=\"submit\">Verify email</button></noscript>",
                "</form></body></html>",
            ),
            action = auth_url,
            login_hint = ctx.claimed,
            nonce = nonce,
            client_id = ctx.config.service_url,
            redirect_uri = ctx.callback_url("email"),
        );

        Ok(BeginAction::Page(page))
    }

    async fn complete(
        &self,
        ctx: &mut FlowContext<'_>,
        input: &CallbackInput,
    ) -> Result<String, BrokerError> {
        let expected_nonce = ctx
            .secrets
            .remove(NONCE_KEY)
            .ok_or(BrokerError::NonceMismatch)?;

        let id_token = input
            .param("id_token")
            .ok_or_else(|| BrokerError::AdapterProtocol("portier: no id_token posted".into()))?;

        let header = decode_header(id_token)
            .map_err(|e| BrokerError::AdapterProtocol(format!("portier: bad token: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| BrokerError::AdapterProtocol("portier: token without kid".into()))?;
        let key = Self::fetch_key(ctx, &kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&ctx.config.service_url]);
        validation.set_issuer(&[&ctx.config.portier_broker]);

        let token = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| BrokerError::AdapterProtocol(format!("portier: invalid token: {e}")))?;

        if token.claims.nonce.as_deref() != Some(expected_nonce.as_str()) {
            return Err(BrokerError::NonceMismatch);
        }

        if !token.claims.sub.eq_ignore_ascii_case(ctx.claimed) {
            return Err(BrokerError::IdentityMismatch {
                claimed: ctx.claimed.to_string(),
            });
        }

        Ok(ctx.claimed.to_string())
    }
}
