//! Dispatcher: turns submitted wrappers into independently running relay
//! tasks, and logs errors that belong to no particular request.
//!
//! State machine: Idle -> Running -> Stopped. A relay failure never stops the
//! dispatcher; it only ever reaches the failing wrapper's own error channel.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::channel::{DispatchReceiver, ErrorReceiver};
use super::config::DispatchConfig;
use super::task::Relay;

/// Lifecycle state of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed, loops not yet started.
    Idle,
    /// Consume and error-log loops are running.
    Running,
    /// Loops have exited (explicit stop or every producer dropped).
    Stopped,
}

/// Idle dispatcher holding the relay and its concurrency limit.
pub struct Dispatcher {
    relay: Arc<Relay>,
    limiter: Arc<Semaphore>,
    max_concurrent: usize,
    state: Arc<ArcSwap<DispatcherState>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(relay: Relay, config: &DispatchConfig) -> Self {
        let max_concurrent = config.max_concurrent_relays.max(1);
        Self {
            relay: Arc::new(relay),
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            state: Arc::new(ArcSwap::from_pointee(DispatcherState::Idle)),
        }
    }

    #[must_use]
    pub fn state(&self) -> DispatcherState {
        **self.state.load()
    }

    /// Starts the consume-and-spawn loop and the error-log loop.
    ///
    /// The consume loop acquires a permit before spawning each relay task, so
    /// at most `max_concurrent_relays` run at once. While it waits for a
    /// permit the dispatch channel fills up and further submissions are
    /// rejected as overloaded.
    #[must_use]
    pub fn start(self, wrappers: DispatchReceiver, errors: ErrorReceiver) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.state.store(Arc::new(DispatcherState::Running));
        info!(
            target_url = %self.relay.target(),
            max_concurrent = self.max_concurrent,
            "dispatcher running"
        );

        let consume = tokio::spawn(consume_loop(
            wrappers,
            Arc::clone(&self.relay),
            Arc::clone(&self.limiter),
            Arc::clone(&self.state),
            shutdown_rx.clone(),
        ));
        let error_log = tokio::spawn(error_log_loop(errors, shutdown_rx));

        DispatcherHandle {
            shutdown_tx,
            consume: Some(consume),
            error_log: Some(error_log),
            limiter: self.limiter,
            max_concurrent: self.max_concurrent,
            state: self.state,
        }
    }
}

/// Handle to a running dispatcher.
///
/// Dropping the handle leaves the loops running detached; call
/// [`stop`](Self::stop) to end them.
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    consume: Option<JoinHandle<()>>,
    error_log: Option<JoinHandle<()>>,
    limiter: Arc<Semaphore>,
    max_concurrent: usize,
    state: Arc<ArcSwap<DispatcherState>>,
}

impl DispatcherHandle {
    #[must_use]
    pub fn state(&self) -> DispatcherState {
        **self.state.load()
    }

    /// Number of relay tasks currently holding a concurrency permit.
    #[must_use]
    pub fn active_relays(&self) -> usize {
        self.max_concurrent - self.limiter.available_permits()
    }

    /// Stops both loops and waits for them to exit.
    ///
    /// Relay tasks already spawned run to completion; wrappers still queued
    /// are dropped and their waiters observe `RelayError::Abandoned`.
    pub async fn stop(&mut self) {
        // Ignore send errors -- receivers may have exited already
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.consume.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.error_log.take() {
            let _ = handle.await;
        }
        self.state.store(Arc::new(DispatcherState::Stopped));
        info!("dispatcher stopped");
    }
}

async fn consume_loop(
    mut wrappers: DispatchReceiver,
    relay: Arc<Relay>,
    limiter: Arc<Semaphore>,
    state: Arc<ArcSwap<DispatcherState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let wrapper = tokio::select! {
            wrapper = wrappers.recv() => match wrapper {
                Some(w) => w,
                None => break, // Every sender dropped.
            },
            Ok(()) = shutdown.changed() => break,
        };

        let permit = tokio::select! {
            permit = Arc::clone(&limiter).acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break, // Semaphore closed.
            },
            Ok(()) = shutdown.changed() => break,
        };

        debug!(correlation_id = %wrapper.id(), "spawning relay task");
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            relay.run(wrapper).await;
            drop(permit);
        });
    }

    state.store(Arc::new(DispatcherState::Stopped));
    debug!("consume loop exited");
}

async fn error_log_loop(mut errors: ErrorReceiver, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            err = errors.recv() => match err {
                Some(err) => error!(error = %format!("{err:#}"), "non-correlated error"),
                None => break,
            },
            Ok(()) = shutdown.changed() => break,
        }
    }
    debug!("error-log loop exited");
}
