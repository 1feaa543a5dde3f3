//! Process-wide channels shared between the ingress side and the dispatcher.
//!
//! Both are created once at startup and handed explicitly to their producers
//! and to the dispatcher. They are the only structures shared across
//! requests.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use super::wrapper::CorrelationWrapper;
use super::RelayError;

/// Creates the bounded dispatch channel carrying wrappers to the dispatcher.
#[must_use]
pub fn dispatch_channel(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DispatchSender { tx }, DispatchReceiver { rx })
}

/// Creates the non-correlated error channel drained by the dispatcher's
/// error-log loop.
#[must_use]
pub fn error_channel(capacity: usize) -> (ErrorSender, ErrorReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ErrorSender { tx }, ErrorReceiver { rx })
}

/// Producer handle for the dispatch channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<CorrelationWrapper>,
}

impl DispatchSender {
    /// Enqueues `wrapper` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Overloaded`] when the queue is full and
    /// [`RelayError::Abandoned`] when the dispatcher has stopped. In both
    /// cases the wrapper is dropped.
    pub fn submit(&self, wrapper: CorrelationWrapper) -> Result<(), RelayError> {
        match self.tx.try_send(wrapper) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RelayError::Overloaded),
            Err(TrySendError::Closed(_)) => Err(RelayError::Abandoned),
        }
    }

    /// Remaining free slots in the queue.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer end of the dispatch channel, owned by the dispatcher.
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<CorrelationWrapper>,
}

impl DispatchReceiver {
    /// Receives the next wrapper; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<CorrelationWrapper> {
        self.rx.recv().await
    }

    /// Non-blocking receive; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<CorrelationWrapper> {
        self.rx.try_recv().ok()
    }
}

/// Producer handle for errors that belong to no particular request.
#[derive(Debug, Clone)]
pub struct ErrorSender {
    tx: mpsc::Sender<anyhow::Error>,
}

impl ErrorSender {
    /// Hands `error` to the error-log loop.
    ///
    /// Never blocks: if the channel is full or closed the error is logged
    /// inline instead.
    pub fn report(&self, error: anyhow::Error) {
        match self.tx.try_send(error) {
            Ok(()) => {}
            Err(TrySendError::Full(error) | TrySendError::Closed(error)) => {
                warn!(error = %format!("{error:#}"), "error channel unavailable");
            }
        }
    }

    /// Remaining free slots in the channel.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer end of the error channel, owned by the dispatcher.
#[derive(Debug)]
pub struct ErrorReceiver {
    rx: mpsc::Receiver<anyhow::Error>,
}

impl ErrorReceiver {
    pub async fn recv(&mut self) -> Option<anyhow::Error> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<anyhow::Error> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use hookrelay_core::Context;

    use super::*;

    #[tokio::test]
    async fn submit_and_receive_in_order() {
        let (tx, mut rx) = dispatch_channel(4);
        let (first, _p1) = CorrelationWrapper::new(Context::new());
        let (second, _p2) = CorrelationWrapper::new(Context::new());
        let (id1, id2) = (first.id(), second.id());

        tx.submit(first).unwrap();
        tx.submit(second).unwrap();

        assert_eq!(rx.recv().await.unwrap().id(), id1);
        assert_eq!(rx.recv().await.unwrap().id(), id2);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn full_queue_is_overloaded_and_abandons_wrapper() {
        let (tx, _rx) = dispatch_channel(1);
        let (first, _p1) = CorrelationWrapper::new(Context::new());
        tx.submit(first).unwrap();
        assert_eq!(tx.capacity(), 0);

        let (second, pending) = CorrelationWrapper::new(Context::new());
        assert!(matches!(tx.submit(second), Err(RelayError::Overloaded)));
        assert!(matches!(pending.wait().await, Err(RelayError::Abandoned)));
    }

    #[tokio::test]
    async fn closed_queue_rejects_submission() {
        let (tx, rx) = dispatch_channel(1);
        drop(rx);
        let (wrapper, _pending) = CorrelationWrapper::new(Context::new());
        assert!(matches!(tx.submit(wrapper), Err(RelayError::Abandoned)));
    }

    #[tokio::test]
    async fn report_forwards_errors() {
        let (tx, mut rx) = error_channel(2);
        tx.report(anyhow::anyhow!("connector failed"));
        let err = rx.recv().await.unwrap();
        assert_eq!(err.to_string(), "connector failed");
    }

    #[test]
    fn report_on_full_channel_does_not_block() {
        let (tx, mut rx) = error_channel(1);
        tx.report(anyhow::anyhow!("first"));
        tx.report(anyhow::anyhow!("second"));
        assert_eq!(rx.try_recv().unwrap().to_string(), "first");
        assert!(rx.try_recv().is_none());
    }
}
