//! Synchronous-request / asynchronous-relay correlation engine.
//!
//! 1. **Wrapper** (`wrapper`): a `Context` paired with single-use result and
//!    error channels
//! 2. **Channels** (`channel`): the shared, bounded dispatch channel and the
//!    non-correlated error channel
//! 3. **Dispatcher** (`dispatcher`): consumes wrappers and spawns relay tasks
//!    under a concurrency limit
//! 4. **Relay task** (`task`): forwards a `Context` downstream over HTTP and
//!    publishes the outcome on the wrapper's channels

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod task;
pub mod wrapper;

pub use channel::{
    dispatch_channel, error_channel, DispatchReceiver, DispatchSender, ErrorReceiver, ErrorSender,
};
pub use config::{DispatchConfig, RelayConfig};
pub use dispatcher::{Dispatcher, DispatcherHandle, DispatcherState};
pub use task::Relay;
pub use wrapper::{Completion, CorrelationWrapper, PendingOutcome};

use hookrelay_core::ContextError;
use reqwest::StatusCode;

/// Failure outcomes delivered on a wrapper's error channel.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("error marshaling context: {0}")]
    Serialization(#[source] ContextError),
    #[error("error delegating further processing to {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("relay target returned status code: {status}")]
    UpstreamStatus { status: StatusCode },
    #[error("error unmarshaling response: {0}")]
    Deserialization(#[source] ContextError),
    #[error("dispatch queue is full, try again later")]
    Overloaded,
    #[error("relay did not complete within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("relay ended without producing an outcome")]
    Abandoned,
}
