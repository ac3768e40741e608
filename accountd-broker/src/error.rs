//! Broker error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Cannot classify identifier: {0}")]
    Classification(String),

    #[error("Username must use only ascii letters, numbers and underscores")]
    InvalidUsername,

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Flow does not belong to this session")]
    SessionMismatch,

    #[error("Flow expired or never started")]
    FlowExpired,

    #[error("Anti-forgery nonce missing or mismatched")]
    NonceMismatch,

    #[error("Verification failed: {0}")]
    AdapterProtocol(String),

    #[error("Verified identity does not match {claimed}")]
    IdentityMismatch { claimed: String },

    #[error("Unknown or expired code")]
    CodeExpiredOrUnknown,

    #[error("Invalid assertion")]
    InvalidAssertion,

    #[error("Invalid redirect_uri")]
    InvalidRedirectUri,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<accountd_core::Error> for BrokerError {
    fn from(err: accountd_core::Error) -> Self {
        use accountd_core::Error as CoreError;
        match err {
            CoreError::InvalidIdentifier(msg) => BrokerError::Classification(msg),
            CoreError::InvalidAssertion(_)
            | CoreError::UnsupportedAlgorithm(_)
            | CoreError::SignatureVerificationFailed
            | CoreError::Base64(_)
            | CoreError::Json(_) => BrokerError::InvalidAssertion,
            other => BrokerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BrokerError::Classification(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            BrokerError::InvalidUsername => (
                StatusCode::BAD_REQUEST,
                "username must use only ascii letters, numbers and underscores",
            ),
            BrokerError::UnsupportedProvider(provider) => {
                tracing::debug!(provider, "unsupported provider requested");
                (StatusCode::NOT_FOUND, "unsupported provider")
            }
            BrokerError::SessionMismatch => {
                (StatusCode::FORBIDDEN, "wrong user/account, go to /login first")
            }
            BrokerError::FlowExpired => {
                (StatusCode::FORBIDDEN, "flow expired, go to /login first")
            }
            BrokerError::NonceMismatch => {
                tracing::warn!("anti-forgery nonce missing or mismatched");
                (StatusCode::FORBIDDEN, "anti-forgery check failed")
            }
            BrokerError::AdapterProtocol(msg) => {
                tracing::info!("verification failed: {}", msg);
                (StatusCode::FORBIDDEN, "could not authenticate")
            }
            BrokerError::IdentityMismatch { .. } => {
                (StatusCode::FORBIDDEN, "verified identity does not match")
            }
            BrokerError::CodeExpiredOrUnknown => (StatusCode::NOT_FOUND, "unknown code"),
            BrokerError::InvalidAssertion => (StatusCode::BAD_REQUEST, "invalid assertion"),
            BrokerError::InvalidRedirectUri => (StatusCode::BAD_REQUEST, "invalid redirect_uri"),
            BrokerError::Store(msg) => {
                tracing::error!("store error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            BrokerError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}
