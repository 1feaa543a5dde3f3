//! `hookrelay` server -- webhook ingress that relays each event to a
//! downstream runtime over HTTP and answers the caller with that event's own
//! result.
//!
//! - [`relay`]: correlation wrapper, dispatcher, relay task
//! - [`network`]: ingress, health and binding HTTP surfaces
//! - [`event`]: provider event decoding
//! - [`cli`]: command-line surface and logging bootstrap

pub mod cli;
pub mod event;
pub mod network;
pub mod relay;
pub mod traits;

pub use traits::{Binding, EventDecoder};
