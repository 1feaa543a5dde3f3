//! HTTP surface for a [`Binding`]: the receiving end of a relay.
//!
//! `POST /` accepts a serialized context, runs the binding against it and
//! replies with the (possibly updated) context. Every reply body is a JSON
//! context, including failures, so the relaying side can still decode it.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use hookrelay_core::Context;
use tracing::{debug, error};

use super::{context_response, healthz_handler};
use crate::traits::Binding;

/// Builds the router serving `POST /` (bind) and `GET /healthz`.
pub fn build_binding_router(binding: Arc<dyn Binding>) -> Router {
    Router::new()
        .route("/", post(bind_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(binding)
}

async fn bind_handler(State(binding): State<Arc<dyn Binding>>, body: Bytes) -> Response {
    let mut ctx = match Context::decode(&body) {
        Ok(ctx) => ctx,
        Err(err) => {
            debug!(error = %err, "received bad binding request");
            return context_response(StatusCode::BAD_REQUEST, &Context::new());
        }
    };

    debug!(context = ?ctx.raw(), "received binding request");

    if let Err(err) = binding.bind(&mut ctx).await {
        error!(error = %format!("{err:#}"), "error executing binding");
        return context_response(StatusCode::INTERNAL_SERVER_ERROR, &ctx);
    }

    debug!("completed binding request");
    context_response(StatusCode::OK, &ctx)
}
