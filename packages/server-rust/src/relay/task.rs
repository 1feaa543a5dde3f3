//! Relay task: forwards one wrapper's context to the downstream target and
//! publishes the outcome on the wrapper's channels.

use std::time::Instant;

use hookrelay_core::Context;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, info_span, Instrument};

use super::config::RelayConfig;
use super::wrapper::CorrelationWrapper;
use super::RelayError;

/// HTTP relay to a fixed downstream address.
///
/// Shared by every relay task (the inner `reqwest::Client` pools
/// connections). Each attempt is single-shot: the first failure is terminal.
#[derive(Debug, Clone)]
pub struct Relay {
    client: reqwest::Client,
    target: String,
}

impl Relay {
    /// Builds the relay and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (e.g. the
    /// TLS backend fails to initialize).
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            target: config.target_url.clone(),
        })
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Runs one relay attempt for `wrapper` and publishes its outcome.
    ///
    /// If the waiter drops its `PendingOutcome` first, the in-flight request
    /// is abandoned and nothing is published.
    pub async fn run(&self, wrapper: CorrelationWrapper) {
        let span = info_span!(
            "relay",
            correlation_id = %wrapper.id(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let (context, mut completion) = wrapper.into_parts();
            debug!(target_url = %self.target, "delegating further processing to the relay target");

            let outcome = tokio::select! {
                outcome = self.forward(&context) => outcome,
                () = completion.cancelled() => {
                    record_outcome(start, "cancelled");
                    debug!("waiter went away, abandoning relay");
                    return;
                }
            };

            let delivered = match outcome {
                Ok(result) => {
                    record_outcome(start, "ok");
                    completion.resolve(result)
                }
                Err(error) => {
                    record_outcome(start, "error");
                    debug!(error = %error, "relay failed");
                    completion.reject(error)
                }
            };
            if !delivered {
                debug!("outcome produced after the waiter went away");
            }
        }
        .instrument(span)
        .await;
    }

    /// Serializes `context`, POSTs it to the target and decodes the reply.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Serialization`] if the context cannot be encoded
    /// - [`RelayError::Transport`] on connection, timeout or body-read failure
    /// - [`RelayError::UpstreamStatus`] for any status other than 200
    /// - [`RelayError::Deserialization`] if the reply is not a context
    pub async fn forward(&self, context: &Context) -> Result<Context, RelayError> {
        let body = context.encode().map_err(RelayError::Serialization)?;

        let response = self
            .client
            .post(&self.target)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelayError::UpstreamStatus { status });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| self.transport_error(source))?;
        Context::decode(&bytes).map_err(RelayError::Deserialization)
    }

    fn transport_error(&self, source: reqwest::Error) -> RelayError {
        RelayError::Transport {
            target: self.target.clone(),
            source,
        }
    }
}

fn record_outcome(start: Instant, outcome: &'static str) {
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let span = tracing::Span::current();
    span.record("duration_ms", duration_ms);
    span.record("outcome", outcome);
    debug!(duration_ms, outcome, "relay complete");
}
