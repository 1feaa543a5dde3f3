//! HTTP handlers for the ingress, health and binding surfaces.
//!
//! `AppState` is the shared state carried through axum extractors by the
//! ingress and health routers. The binding router has its own state (see
//! [`binding`]).

pub mod binding;
pub mod health;
pub mod ingress;

pub use binding::build_binding_router;
pub use health::{healthz_handler, readiness_handler};
pub use ingress::ingress_handler;

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use hookrelay_core::Context;
use tracing::error;

use super::{NetworkConfig, ShutdownController};
use crate::relay::{DispatchSender, ErrorSender};
use crate::traits::EventDecoder;

/// Shared application state passed to handlers via `State` extraction.
///
/// Every field is a cheap handle, so cloning per request is fine.
#[derive(Clone)]
pub struct AppState {
    /// Turns webhook bodies into contexts or immediate replies.
    pub decoder: Arc<dyn EventDecoder>,
    /// Producer end of the dispatch channel.
    pub dispatch: DispatchSender,
    /// Producer end of the non-correlated error channel.
    pub errors: ErrorSender,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
}

/// Replies with `ctx` as a JSON body, or 500 with `{}` if it cannot be
/// encoded.
pub(crate) fn context_response(status: StatusCode, ctx: &Context) -> Response {
    let json = [(header::CONTENT_TYPE, "application/json")];
    match ctx.encode() {
        Ok(body) => (status, json, body).into_response(),
        Err(err) => {
            error!(error = %err, "error encoding response context");
            (StatusCode::INTERNAL_SERVER_ERROR, json, "{}").into_response()
        }
    }
}
