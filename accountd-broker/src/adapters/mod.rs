//! Verification adapters
//!
//! One adapter per verification method. An adapter owns both halves of
//! an external handshake: `begin` sends the visitor out to the
//! verifier, `complete` consumes the callback and returns the verified
//! identifier. Handshake secrets (nonces, request tokens) live in the
//! flow state between the two halves and are consumed on completion.

use std::collections::HashMap;

use accountd_core::{local_part, Method};
use async_trait::async_trait;

use crate::config::Config;
use crate::error::BrokerError;

mod domain;
mod email;
mod github;
mod oauth1;
mod phone;
mod test;

pub use domain::DomainAdapter;
pub use email::EmailAdapter;
pub use github::GithubAdapter;
pub use oauth1::OAuth1Adapter;
pub use phone::PhoneAdapter;
pub use test::TestAdapter;

/// How to send the visitor to the external verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginAction {
    /// Plain redirect
    Redirect(String),
    /// A page to render (e.g. an auto-submitting form post)
    Page(String),
}

/// Parameters arriving on the provider callback, query or form encoded
#[derive(Debug, Default)]
pub struct CallbackInput {
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
}

impl CallbackInput {
    pub fn from_query(query: HashMap<String, String>) -> Self {
        Self {
            query,
            form: HashMap::new(),
        }
    }

    pub fn from_form(form: HashMap<String, String>) -> Self {
        Self {
            query: HashMap::new(),
            form,
        }
    }

    /// A named parameter, wherever the provider put it
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .or_else(|| self.form.get(name))
            .map(String::as_str)
    }
}

/// Everything an adapter may touch while handling one flow
pub struct FlowContext<'a> {
    pub http: &'a reqwest::Client,
    pub config: &'a Config,
    /// Identifier the visitor claims to control
    pub claimed: &'a str,
    /// Handshake secrets, persisted with the flow between halves
    pub secrets: &'a mut HashMap<String, String>,
}

impl FlowContext<'_> {
    /// Callback URL the provider should return the visitor to
    pub fn callback_url(&self, provider: &str) -> String {
        format!("{}/callback/from/{}", self.config.service_url, provider)
    }

    /// Local part of the claimed identifier (`alice` in `alice@github`)
    pub fn claimed_local(&self) -> &str {
        local_part(self.claimed)
    }
}

/// One verification method's external handshake
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Name used in callback paths and secret keys
    fn name(&self) -> &'static str;

    /// Start the handshake for `ctx.claimed`
    async fn begin(&self, ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError>;

    /// Consume the provider callback. Returns the verified identifier,
    /// which must equal the claimed one.
    async fn complete(
        &self,
        ctx: &mut FlowContext<'_>,
        input: &CallbackInput,
    ) -> Result<String, BrokerError>;
}

/// The closed set of adapters this broker ships
pub struct AdapterRegistry {
    domain: DomainAdapter,
    email: EmailAdapter,
    github: GithubAdapter,
    trello: OAuth1Adapter,
    twitter: OAuth1Adapter,
    phone: PhoneAdapter,
    /// Only present when the testing flag is set
    test: Option<TestAdapter>,
}

impl AdapterRegistry {
    pub fn new(config: &Config) -> Self {
        Self {
            domain: DomainAdapter,
            email: EmailAdapter,
            github: GithubAdapter,
            trello: OAuth1Adapter::new(oauth1::trello(), config.trello.clone()),
            twitter: OAuth1Adapter::new(oauth1::twitter(), config.twitter.clone()),
            phone: PhoneAdapter,
            test: config.testing.then_some(TestAdapter),
        }
    }

    /// Adapter for a classified method, if this broker supports it
    pub fn resolve(&self, method: &Method) -> Result<&dyn Adapter, BrokerError> {
        match method {
            Method::Phone => Ok(&self.phone),
            Method::Domain => Ok(&self.domain),
            Method::Email => Ok(&self.email),
            Method::Silo(provider) => match provider.as_str() {
                "github" => Ok(&self.github),
                "trello" => Ok(&self.trello),
                "twitter" => Ok(&self.twitter),
                "test" => self
                    .test
                    .as_ref()
                    .map(|t| t as &dyn Adapter)
                    .ok_or_else(|| BrokerError::UnsupportedProvider(provider.clone())),
                _ => Err(BrokerError::UnsupportedProvider(provider.clone())),
            },
        }
    }
}
