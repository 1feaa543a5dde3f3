//! Webhook ingress: decode, hand off to the dispatcher, wait for the
//! correlated outcome and answer the original caller.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use super::{context_response, AppState};
use crate::event::Decoded;
use crate::relay::{CorrelationWrapper, RelayError};

/// `POST /` on the event port.
///
/// | Outcome                          | Status |
/// |----------------------------------|--------|
/// | relay result                     | 200 + context JSON |
/// | validation handshake             | 200 + `{"ValidationResponse": ..}` |
/// | malformed body / invalid URL     | 400 |
/// | relay failure                    | 500 |
/// | dispatch queue full              | 503 |
/// | relay deadline expired           | 504 |
pub async fn ingress_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let _guard = state.shutdown.in_flight_guard();

    let context = match state.decoder.decode(&body) {
        Ok(Decoded::Reply(reply)) => return (StatusCode::OK, Json(reply)).into_response(),
        Ok(Decoded::Relay(context)) => context,
        Err(err) => {
            state.errors.report(anyhow::Error::new(err));
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let (wrapper, pending) = CorrelationWrapper::new(context);
    let correlation_id = wrapper.id();

    async move {
        if let Err(err) = state.dispatch.submit(wrapper) {
            return relay_failure(&state, correlation_id, err);
        }
        debug!("event dispatched, awaiting relay outcome");

        match pending.wait_timeout(state.config.relay_wait_timeout).await {
            Ok(result) => context_response(StatusCode::OK, &result),
            Err(err) => relay_failure(&state, correlation_id, err),
        }
    }
    .instrument(info_span!("ingress", correlation_id = %correlation_id))
    .await
}

fn relay_failure(state: &AppState, correlation_id: Uuid, err: RelayError) -> Response {
    let status = status_for(&err);
    state.errors.report(
        anyhow::Error::new(err).context(format!("error handling event {correlation_id}")),
    );
    status.into_response()
}

fn status_for(err: &RelayError) -> StatusCode {
    match err {
        RelayError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
