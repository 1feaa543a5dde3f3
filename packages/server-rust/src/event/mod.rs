//! Provider event decoding: turns inbound webhook bodies into relayable
//! contexts or immediate replies.

pub mod blob;

pub use blob::{BlobContextKeys, BlobEventDecoder};

use hookrelay_core::Context;

/// What the ingress should do with a decoded event.
#[derive(Debug)]
pub enum Decoded {
    /// Answer the caller directly; nothing is relayed.
    Reply(serde_json::Value),
    /// Relay this context and reply with the outcome.
    Relay(Context),
}

/// Inbound payload rejected before any relay is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("blob URL is not a valid Azure Storage URL: {url}")]
    InvalidBlobUrl { url: String },
}
