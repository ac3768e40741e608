//! Per-session flow state
//!
//! The only mutable state a verification flow carries between requests.
//! One record per visitor session, serialized into the ephemeral store
//! under `flow:<token>` and bounded by the session TTL. A missing or
//! expired record fails the flow closed — adapter secrets are never
//! re-derived.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::store::EphemeralStore;

/// Where a verification flow currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    /// No verification in progress
    Idle,
    /// Redirected out to an external verifier, waiting for the callback
    AwaitingVerification,
    /// Waiting for the visitor to verify an alternate identifier
    Disambiguating,
}

/// How the final result reaches the calling application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Signed assertion in the redirect query (or response body)
    Token,
    /// One-time exchange code in the redirect query
    Code,
}

impl Default for ResponseMode {
    fn default() -> Self {
        ResponseMode::Token
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowState {
    pub stage: FlowStage,

    /// User handle the visitor wants; absent means "look it up"
    pub desired_user: Option<String>,

    /// Identifier currently being verified
    pub account: Option<String>,

    /// Original identifier a verified alternate is authorizing
    pub initial_account: Option<String>,

    /// Where the calling application wants the result delivered
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub response_mode: ResponseMode,

    /// Adapter nonces/tokens for the in-flight handshake
    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// Identifiers verified in this session, in order
    #[serde(default)]
    pub authorized: Vec<String>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            stage: FlowStage::Idle,
            desired_user: None,
            account: None,
            initial_account: None,
            redirect_uri: None,
            response_mode: ResponseMode::default(),
            secrets: HashMap::new(),
            authorized: Vec::new(),
        }
    }
}

impl FlowState {
    /// Record a verification request and wait for the external callback.
    pub fn begin_verification(&mut self, account: &str) {
        self.stage = FlowStage::AwaitingVerification;
        self.account = Some(account.to_string());
    }

    /// A callback may only resume a flow that is actually waiting;
    /// anything else is a stale or forged resume.
    pub fn expect_awaiting(&self) -> Result<&str, BrokerError> {
        match (self.stage, self.account.as_deref()) {
            (FlowStage::AwaitingVerification, Some(account)) => Ok(account),
            _ => Err(BrokerError::SessionMismatch),
        }
    }

    /// Record an identifier as verified in this session.
    pub fn mark_authorized(&mut self, account: &str) {
        if !self.authorized.iter().any(|a| a == account) {
            self.authorized.push(account.to_string());
        }
    }

    pub fn enter_disambiguation(&mut self) {
        self.stage = FlowStage::Disambiguating;
    }
}

fn flow_key(token: &str) -> String {
    format!("flow:{token}")
}

pub fn load_flow<F: EphemeralStore>(
    store: &F,
    token: &str,
) -> Result<Option<FlowState>, BrokerError> {
    let Some(raw) = store.get(&flow_key(token))? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| BrokerError::Internal(e.to_string()))
}

pub fn save_flow<F: EphemeralStore>(
    store: &F,
    token: &str,
    flow: &FlowState,
    ttl_secs: u64,
) -> Result<(), BrokerError> {
    let raw = serde_json::to_string(flow).map_err(|e| BrokerError::Internal(e.to_string()))?;
    store.set_with_expiry(&flow_key(token), &raw, ttl_secs)
}

pub fn clear_flow<F: EphemeralStore>(store: &F, token: &str) -> Result<(), BrokerError> {
    store.delete(&flow_key(token))
}
