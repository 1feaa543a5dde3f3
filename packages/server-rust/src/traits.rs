use async_trait::async_trait;
use hookrelay_core::Context;

use crate::event::{Decoded, ValidationError};

/// Turns a provider-specific webhook body into either an immediate reply or a
/// `Context` to relay.
/// Implementations: Azure Event Grid blob events, test decoders.
pub trait EventDecoder: Send + Sync + 'static {
    /// Decode one inbound request body.
    ///
    /// A returned error means the payload is rejected with 400 before any
    /// correlation wrapper is created.
    fn decode(&self, body: &[u8]) -> Result<Decoded, ValidationError>;
}

/// Downstream action applied to a relayed `Context` (the receiving end of a
/// relay).
/// Implementations read their inputs from the context and write their
/// outputs back into it.
#[async_trait]
pub trait Binding: Send + Sync + 'static {
    /// Perform the action. The (possibly updated) context is returned to the
    /// caller whether or not the action succeeds.
    async fn bind(&self, ctx: &mut Context) -> anyhow::Result<()>;
}
