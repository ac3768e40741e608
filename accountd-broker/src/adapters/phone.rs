//! Phone identifiers classify cleanly but have no verification channel
//! wired up yet, so the adapter refuses both halves of the handshake.

use async_trait::async_trait;

use super::{Adapter, BeginAction, CallbackInput, FlowContext};
use crate::error::BrokerError;

pub struct PhoneAdapter;

#[async_trait]
impl Adapter for PhoneAdapter {
    fn name(&self) -> &'static str {
        "phone"
    }

    async fn begin(&self, _ctx: &mut FlowContext<'_>) -> Result<BeginAction, BrokerError> {
        Err(BrokerError::UnsupportedProvider("phone".to_string()))
    }

    async fn complete(
        &self,
        _ctx: &mut FlowContext<'_>,
        _input: &CallbackInput,
    ) -> Result<String, BrokerError> {
        Err(BrokerError::UnsupportedProvider("phone".to_string()))
    }
}
