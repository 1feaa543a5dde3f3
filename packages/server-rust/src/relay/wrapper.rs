//! Correlation wrapper: joins an asynchronous relay outcome back to the task
//! waiting for it.
//!
//! Creating a wrapper yields two halves. The [`CorrelationWrapper`] travels
//! through the dispatcher to a relay task; the [`PendingOutcome`] stays with
//! the waiting ingress handler. The producer side publishes through a
//! [`Completion`], whose `resolve`/`reject` consume it, so at most one of the
//! two channels is ever written and at most once.

use std::time::Duration;

use hookrelay_core::Context;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::RelayError;

/// A `Context` paired with the producer half of its completion channels.
#[derive(Debug)]
pub struct CorrelationWrapper {
    id: Uuid,
    context: Context,
    completion: Completion,
}

impl CorrelationWrapper {
    /// Wraps `context`, returning the wrapper and the waiter's half.
    #[must_use]
    pub fn new(context: Context) -> (Self, PendingOutcome) {
        let id = Uuid::new_v4();
        let (result_tx, result_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let wrapper = Self {
            id,
            context,
            completion: Completion {
                id,
                result_tx,
                error_tx,
            },
        };
        let pending = PendingOutcome {
            id,
            result_rx,
            error_rx,
        };
        (wrapper, pending)
    }

    /// Correlation id, shared with the matching [`PendingOutcome`].
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Splits into the owned context and the completion used to publish the
    /// outcome.
    #[must_use]
    pub fn into_parts(self) -> (Context, Completion) {
        (self.context, self.completion)
    }
}

/// Producer half: the result and error senders of one wrapper.
///
/// Dropping a `Completion` without publishing closes both channels, which the
/// waiter observes as [`RelayError::Abandoned`].
#[derive(Debug)]
pub struct Completion {
    id: Uuid,
    result_tx: oneshot::Sender<Context>,
    error_tx: oneshot::Sender<RelayError>,
}

impl Completion {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Publishes `context` on the result channel.
    ///
    /// Returns `false` if the waiter had already gone away.
    pub fn resolve(self, context: Context) -> bool {
        let Self {
            result_tx,
            error_tx,
            ..
        } = self;
        drop(error_tx);
        result_tx.send(context).is_ok()
    }

    /// Publishes `error` on the error channel.
    ///
    /// Returns `false` if the waiter had already gone away.
    pub fn reject(self, error: RelayError) -> bool {
        let Self {
            result_tx,
            error_tx,
            ..
        } = self;
        drop(result_tx);
        error_tx.send(error).is_ok()
    }

    /// Resolves once the waiter has dropped its [`PendingOutcome`], e.g.
    /// after its deadline expired.
    pub async fn cancelled(&mut self) {
        self.result_tx.closed().await;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.result_tx.is_closed()
    }
}

/// Waiter half: the result and error receivers of one wrapper.
#[derive(Debug)]
pub struct PendingOutcome {
    id: Uuid,
    result_rx: oneshot::Receiver<Context>,
    error_rx: oneshot::Receiver<RelayError>,
}

impl PendingOutcome {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn result_channel(&mut self) -> &mut oneshot::Receiver<Context> {
        &mut self.result_rx
    }

    pub fn error_channel(&mut self) -> &mut oneshot::Receiver<RelayError> {
        &mut self.error_rx
    }

    /// Waits for whichever channel fires first.
    ///
    /// # Errors
    ///
    /// Returns the published [`RelayError`], or [`RelayError::Abandoned`] if
    /// the producer was dropped without publishing.
    pub async fn wait(mut self) -> Result<Context, RelayError> {
        tokio::select! {
            Ok(context) = &mut self.result_rx => Ok(context),
            Ok(error) = &mut self.error_rx => Err(error),
            else => Err(RelayError::Abandoned),
        }
    }

    /// Like [`wait`](Self::wait), bounded by `timeout`.
    ///
    /// On expiry the receivers are dropped, which signals cancellation to the
    /// relay task holding the matching [`Completion`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Timeout`] on expiry, otherwise as `wait`.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<Context, RelayError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(RelayError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(key: &str, value: &str) -> Context {
        let mut ctx = Context::new();
        ctx.set(key, value);
        ctx
    }

    #[test]
    fn wrapper_and_pending_share_id() {
        let (wrapper, pending) = CorrelationWrapper::new(Context::new());
        assert_eq!(wrapper.id(), pending.id());
        let (_ctx, completion) = wrapper.into_parts();
        assert_eq!(completion.id(), pending.id());
    }

    #[test]
    fn context_is_retained_by_wrapper() {
        let (wrapper, _pending) = CorrelationWrapper::new(ctx_with("k", "v"));
        assert_eq!(wrapper.context().get_string("k", "").unwrap(), "v");
    }

    #[tokio::test]
    async fn resolve_delivers_only_on_result_channel() {
        let (wrapper, mut pending) = CorrelationWrapper::new(Context::new());
        let (_ctx, completion) = wrapper.into_parts();

        assert!(completion.resolve(ctx_with("out", "1")));

        let ctx = pending.result_channel().await.unwrap();
        assert_eq!(ctx.get_string("out", "").unwrap(), "1");
        assert!(pending.error_channel().await.is_err());
    }

    #[tokio::test]
    async fn reject_delivers_only_on_error_channel() {
        let (wrapper, mut pending) = CorrelationWrapper::new(Context::new());
        let (_ctx, completion) = wrapper.into_parts();

        assert!(completion.reject(RelayError::Overloaded));

        assert!(matches!(
            pending.error_channel().await,
            Ok(RelayError::Overloaded)
        ));
        assert!(pending.result_channel().await.is_err());
    }

    #[tokio::test]
    async fn wait_returns_published_outcome() {
        let (wrapper, pending) = CorrelationWrapper::new(Context::new());
        let (_ctx, completion) = wrapper.into_parts();
        tokio::spawn(async move {
            completion.reject(RelayError::UpstreamStatus {
                status: reqwest::StatusCode::BAD_GATEWAY,
            });
        });

        let err = pending.wait().await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::UpstreamStatus { status } if status == reqwest::StatusCode::BAD_GATEWAY
        ));
    }

    #[tokio::test]
    async fn dropped_completion_is_abandoned() {
        let (wrapper, pending) = CorrelationWrapper::new(Context::new());
        drop(wrapper);
        assert!(matches!(pending.wait().await, Err(RelayError::Abandoned)));
    }

    #[tokio::test]
    async fn wait_timeout_signals_cancellation() {
        let (wrapper, pending) = CorrelationWrapper::new(Context::new());
        let (_ctx, mut completion) = wrapper.into_parts();
        assert!(!completion.is_cancelled());

        let err = pending
            .wait_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout { timeout_ms: 20 }));

        tokio::time::timeout(Duration::from_secs(1), completion.cancelled())
            .await
            .expect("completion should observe cancellation");
        assert!(completion.is_cancelled());
        assert!(!completion.resolve(Context::new()));
    }

    #[tokio::test]
    async fn concurrent_wrappers_each_get_exactly_one_outcome() {
        let mut waiters = Vec::new();
        for i in 0..64u32 {
            let (wrapper, pending) = CorrelationWrapper::new(ctx_with("i", &i.to_string()));
            tokio::spawn(async move {
                let (ctx, completion) = wrapper.into_parts();
                if i % 2 == 0 {
                    completion.resolve(ctx);
                } else {
                    completion.reject(RelayError::Abandoned);
                }
            });
            waiters.push((i, pending));
        }

        for (i, mut pending) in waiters {
            let result = pending.result_channel().await;
            let error = pending.error_channel().await;
            if i % 2 == 0 {
                let ctx = result.expect("even wrappers resolve");
                assert_eq!(ctx.get_string("i", "").unwrap(), i.to_string());
                assert!(error.is_err());
            } else {
                assert!(result.is_err());
                assert!(error.is_ok());
            }
        }
    }
}
