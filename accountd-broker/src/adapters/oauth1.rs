//! OAuth 1.0a adapter (RFC 5849)
//!
//! Trello and Twitter share the three-legged handshake but disagree on
//! details: Trello takes the callback as a `return_url` query parameter
//! on the authorize page and wants extra authorize parameters, Twitter
//! wants `oauth_callback` inside the signed request-token call. The
//! differences live in an `OAuth1Provider` description; the adapter
//! itself is provider-agnostic.
//!
//! All signed requests use HMAC-SHA1 over the RFC 5849 base string.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use uuid::Uuid;

use super::{Adapter, BeginAction, CallbackInput, FlowContext};
use crate::config::ProviderKeys;
use crate::error::BrokerError;

type HmacSha1 = Hmac<Sha1>;

/// Endpoint set and quirks for one OAuth 1.0a provider
pub struct OAuth1Provider {
    pub name: &'static str,
    pub request_token_url: &'static str,
    pub authorize_url: &'static str,
    pub access_token_url: &'static str,
    /// Endpoint returning the authenticated user as JSON
    pub identity_url: &'static str,
    /// JSON field holding the user's handle
    pub identity_field: &'static str,
    /// Extra query parameters for the authorize page
    pub authorize_extra: &'static [(&'static str, &'static str)],
    /// Send `oauth_callback` inside the signed request-token call
    pub callback_in_request: bool,
    /// Query parameter carrying the callback on the authorize page
    pub return_url_param: Option<&'static str>,
}

pub fn trello() -> OAuth1Provider {
    OAuth1Provider {
        name: "trello",
        request_token_url: "https://trello.com/1/OAuthGetRequestToken",
        authorize_url: "https://trello.com/1/OAuthAuthorizeToken",
        access_token_url: "https://trello.com/1/OAuthGetAccessToken",
        identity_url: "https://api.trello.com/1/members/me",
        identity_field: "username",
        authorize_extra: &[("expiration", "1hour"), ("name", "accountd")],
        callback_in_request: false,
        return_url_param: Some("return_url"),
    }
}

pub fn twitter() -> OAuth1Provider {
    OAuth1Provider {
        name: "twitter",
        request_token_url: "https://api.twitter.com/oauth/request_token",
        authorize_url: "https://api.twitter.com/oauth/authenticate",
        access_token_url: "https://api.twitter.com/oauth/access_token",
        identity_url: "https://api.twitter.com/1.1/account/verify_credentials.json",
        identity_field: "screen_name",
        authorize_extra: &[],
        callback_in_request: true,
        return_url_param: None,
    }
}

pub struct OAuth1Adapter {
    provider: OAuth1Provider,
    keys: ProviderKeys,
}

impl OAuth1Adapter {
    pub fn new(provider: OAuth1Provider, keys: ProviderKeys) -> Self {
        Self { provider, keys }
    }

    fn base_params(&self) -> Vec<(String, String)> {
        vec![
            ("oauth_consumer_key".to_string(), self.keys.key.clone()),
            (
                "oauth_nonce".to_string(),
                Uuid::new_v4().simple().to_string(),
            ),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            (
                "oauth_timestamp".to_string(),
                Utc::now().timestamp().to_string(),
            ),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]
    }

    fn secret_key(&self, suffix: &str) -> String {
        format!("{}:{}", self.provider.name, suffix)
    }

    fn protocol_err(&self, err: reqwest::Error) -> BrokerError {
        BrokerError::AdapterProtocol(format!("{}: {err}", self.provider.name))
    }
}

/// RFC 3986 percent-encoding as RFC 5849 §3.6 requires
fn percent(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// HMAC-SHA1 signature over the RFC 5849 §3.4.1 base string
fn signature(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, BrokerError> {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent(k), percent(v)))
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent(url),
        percent(&param_string)
    );
    let key = format!("{}&{}", percent(consumer_secret), percent(token_secret));

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| BrokerError::Internal(e.to_string()))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization: OAuth ...` header for a signed request
fn authorization_header(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, BrokerError> {
    let sig = signature(method, url, params, consumer_secret, token_secret)?;
    let mut header_params = params.to_vec();
    header_params.push(("oauth_signature".to_string(), sig));

    let joined = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, percent(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {joined}"))
}

/// Parse a `k=v&k=v` response body
fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((
                urlencoding::decode(k).ok()?.into_owned(),
                urlencoding::decode(v).ok()?.into_owned(),
            ))
        })
        .collect()
}

#[async_trait]
impl Adapter for OAuth1Adapter {
    fn name(&self) -> &'static str {
        self.provider.name
    }

    async fn begin(&self, ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError> {
        let mut params = self.base_params();
        if self.provider.callback_in_request {
            params.push((
                "oauth_callback".to_string(),
                ctx.callback_url(self.provider.name),
            ));
        }

        let header = authorization_header(
            "POST",
            self.provider.request_token_url,
            &params,
            &self.keys.secret,
            "",
        )?;
        let body = ctx
            .http
            .post(self.provider.request_token_url)
            .header("Authorization", header)
            .send()
            .await
            .map_err(|e| self.protocol_err(e))?
            .text()
            .await
            .map_err(|e| self.protocol_err(e))?;

        let form = parse_form(&body);
        let token = form.get("oauth_token").ok_or_else(|| {
            BrokerError::AdapterProtocol(format!("{}: no request token", self.provider.name))
        })?;
        let token_secret = form.get("oauth_token_secret").ok_or_else(|| {
            BrokerError::AdapterProtocol(format!("{}: no request token secret", self.provider.name))
        })?;

        ctx.secrets
            .insert(self.secret_key("request_token"), token.clone());
        ctx.secrets
            .insert(self.secret_key("request_secret"), token_secret.clone());

        let mut query: Vec<(String, String)> =
            vec![("oauth_token".to_string(), token.clone())];
        for (k, v) in self.provider.authorize_extra {
            query.push((k.to_string(), v.to_string()));
        }
        if let Some(param) = self.provider.return_url_param {
            query.push((param.to_string(), ctx.callback_url(self.provider.name)));
        }

        let url = reqwest::Url::parse_with_params(self.provider.authorize_url, &query)
            .map_err(|e| BrokerError::Internal(e.to_string()))?;
        Ok(BeginAction::Redirect(url.into()))
    }

    async fn complete(
        &self,
        ctx: &mut FlowContext<'_>,
        input: &CallbackInput,
    ) -> Result<String, BrokerError> {
        let request_token = ctx
            .secrets
            .remove(&self.secret_key("request_token"))
            .ok_or(BrokerError::NonceMismatch)?;
        let request_secret = ctx
            .secrets
            .remove(&self.secret_key("request_secret"))
            .ok_or(BrokerError::NonceMismatch)?;

        if input.param("oauth_token") != Some(request_token.as_str()) {
            return Err(BrokerError::NonceMismatch);
        }
        let verifier = input.param("oauth_verifier").ok_or_else(|| {
            BrokerError::AdapterProtocol(format!("{}: no verifier", self.provider.name))
        })?;

        let mut params = self.base_params();
        params.push(("oauth_token".to_string(), request_token.clone()));
        params.push(("oauth_verifier".to_string(), verifier.to_string()));
        let header = authorization_header(
            "POST",
            self.provider.access_token_url,
            &params,
            &self.keys.secret,
            &request_secret,
        )?;
        let body = ctx
            .http
            .post(self.provider.access_token_url)
            .header("Authorization", header)
            .send()
            .await
            .map_err(|e| self.protocol_err(e))?
            .text()
            .await
            .map_err(|e| self.protocol_err(e))?;

        let form = parse_form(&body);
        let access_token = form.get("oauth_token").ok_or_else(|| {
            BrokerError::AdapterProtocol(format!("{}: no access token", self.provider.name))
        })?;
        let access_secret = form.get("oauth_token_secret").ok_or_else(|| {
            BrokerError::AdapterProtocol(format!("{}: no access token secret", self.provider.name))
        })?;

        let mut params = self.base_params();
        params.push(("oauth_token".to_string(), access_token.clone()));
        let header = authorization_header(
            "GET",
            self.provider.identity_url,
            &params,
            &self.keys.secret,
            access_secret,
        )?;
        let profile: serde_json::Value = ctx
            .http
            .get(self.provider.identity_url)
            .header("Authorization", header)
            .send()
            .await
            .map_err(|e| self.protocol_err(e))?
            .json()
            .await
            .map_err(|e| self.protocol_err(e))?;

        let identity = profile
            .get(self.provider.identity_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BrokerError::AdapterProtocol(format!(
                    "{}: profile without {}",
                    self.provider.name, self.provider.identity_field
                ))
            })?;

        if !identity.eq_ignore_ascii_case(ctx.claimed_local()) {
            return Err(BrokerError::IdentityMismatch {
                claimed: ctx.claimed.to_string(),
            });
        }

        Ok(ctx.claimed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The request-token example from RFC 5849 §1.2
    #[test]
    fn test_rfc5849_signature_vector() {
        let params = vec![
            (
                "oauth_consumer_key".to_string(),
                "dpf43f3p2l4k3l03".to_string(),
            ),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            ("oauth_timestamp".to_string(), "137131200".to_string()),
            ("oauth_nonce".to_string(), "wIjqoS".to_string()),
            (
                "oauth_callback".to_string(),
                "http://printer.example.com/ready".to_string(),
            ),
        ];

        let sig = signature(
            "POST",
            "https://photos.example.net/initiate",
            &params,
            "kd94hf93k423kf44",
            "",
        )
        .unwrap();

        assert_eq!(sig, "74KNZJeDHnMBp0EMJ9ZHt/XKycU=");
    }

    #[test]
    fn test_percent_encoding_is_rfc3986() {
        assert_eq!(percent("abc-_.~XYZ09"), "abc-_.~XYZ09");
        assert_eq!(percent("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(percent("http://x/y"), "http%3A%2F%2Fx%2Fy");
    }

    #[test]
    fn test_parse_form_body() {
        let form = parse_form("oauth_token=abc&oauth_token_secret=s%2Fe&oauth_callback_confirmed=true");
        assert_eq!(form.get("oauth_token").unwrap(), "abc");
        assert_eq!(form.get("oauth_token_secret").unwrap(), "s/e");
        assert_eq!(form.get("oauth_callback_confirmed").unwrap(), "true");
        assert!(parse_form("garbage").is_empty());
    }

    #[test]
    fn test_provider_quirks() {
        let trello = trello();
        assert!(!trello.callback_in_request);
        assert_eq!(trello.return_url_param, Some("return_url"));
        assert!(!trello.authorize_extra.is_empty());

        let twitter = twitter();
        assert!(twitter.callback_in_request);
        assert_eq!(twitter.return_url_param, None);
    }

    #[test]
    fn test_authorization_header_shape() {
        let params = vec![("oauth_consumer_key".to_string(), "key".to_string())];
        let header = authorization_header("POST", "https://example.com/x", &params, "s", "").unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_consumer_key=\"key\""));
        assert!(header.contains("oauth_signature=\""));
    }
}
