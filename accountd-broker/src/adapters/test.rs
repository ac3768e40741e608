//! Loopback adapter for integration tests
//!
//! Resolvable only when the testing flag is on. `begin` bounces the
//! visitor straight back to our own callback; `complete` reports the
//! claimed identifier as verified, unless a staged `test:identity`
//! secret overrides it to exercise the mismatch path.

use async_trait::async_trait;

use super::{Adapter, BeginAction, CallbackInput, FlowContext};
use crate::error::BrokerError;

pub struct TestAdapter;

#[async_trait]
impl Adapter for TestAdapter {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn begin(&self, ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError> {
        Ok(BeginAction::Redirect(ctx.callback_url("test")))
    }

    async fn complete(
        &self,
        ctx: &mut FlowContext<'_>,
        _input: &CallbackInput,
    ) -> Result<String, BrokerError> {
        if !ctx.config.testing {
            return Err(BrokerError::AdapterProtocol(
                "test provider is disabled".to_string(),
            ));
        }
        let verified = ctx
            .secrets
            .remove("test:identity")
            .unwrap_or_else(|| ctx.claimed.to_string());
        Ok(verified)
    }
}
