//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the ingress and health
//! listeners, and `serve()` runs both until shutdown. Splitting `start` from
//! `serve` lets the caller learn the bound ports (port 0 is allowed) before
//! traffic is accepted.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{healthz_handler, ingress_handler, readiness_handler, AppState};
use super::middleware::{build_http_layers, HttpLayers};
use super::shutdown::ShutdownController;
use crate::relay::{DispatchSender, ErrorSender};
use crate::traits::EventDecoder;

/// Ports actually bound by [`NetworkModule::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPorts {
    pub ingress: u16,
    pub health: u16,
}

/// Owns the ingress and health listeners of the trigger process.
pub struct NetworkModule {
    config: NetworkConfig,
    ingress_listener: Option<TcpListener>,
    health_listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        decoder: Arc<dyn EventDecoder>,
        dispatch: DispatchSender,
        errors: ErrorSender,
    ) -> Self {
        let state = AppState {
            decoder,
            dispatch,
            errors,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(config.clone()),
        };
        Self {
            config,
            ingress_listener: None,
            health_listener: None,
            state,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// `POST /` -- webhook ingress.
    pub fn build_ingress_router(&self) -> Router {
        Router::new()
            .route("/", post(ingress_handler))
            .layer(self.http_layers())
            .with_state(self.state.clone())
    }

    /// `GET /healthz` and `GET /readyz`.
    pub fn build_health_router(&self) -> Router {
        Router::new()
            .route("/healthz", get(healthz_handler))
            .route("/readyz", get(readiness_handler))
            .layer(self.http_layers())
            .with_state(self.state.clone())
    }

    fn http_layers(&self) -> HttpLayers {
        build_http_layers(self.config.max_body_bytes, self.config.request_timeout)
    }

    /// Binds both listeners and returns the bound ports.
    ///
    /// # Errors
    ///
    /// Returns an error if either address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<BoundPorts> {
        let ingress = bind(&self.config.ingress_host, self.config.ingress_port).await?;
        let health = bind(&self.config.health_host, self.config.health_port).await?;
        let ports = BoundPorts {
            ingress: ingress.local_addr()?.port(),
            health: health.local_addr()?.port(),
        };

        info!(
            bind_address = %format!("{}:{}", self.config.ingress_host, ports.ingress),
            "listening for events"
        );
        info!(
            bind_address = %format!("{}:{}", self.config.health_host, ports.health),
            "listening for health checks"
        );

        self.ingress_listener = Some(ingress);
        self.health_listener = Some(health);
        Ok(ports)
    }

    /// Serves both listeners until `shutdown` resolves, then waits (up to
    /// `drain_timeout`) for in-flight ingress requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or if either server
    /// hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let ingress_router = self.build_ingress_router();
        let health_router = self.build_health_router();
        let (Some(ingress_listener), Some(health_listener)) =
            (self.ingress_listener, self.health_listener)
        else {
            anyhow::bail!("start() must be called before serve()");
        };
        let controller = self.state.shutdown;

        controller.set_ready();
        let trigger = Arc::clone(&controller);
        tokio::spawn(async move {
            shutdown.await;
            info!("shutdown requested");
            trigger.trigger_shutdown();
        });

        let ingress = axum::serve(ingress_listener, ingress_router)
            .with_graceful_shutdown(signalled(controller.shutdown_receiver()));
        let health = axum::serve(health_listener, health_router)
            .with_graceful_shutdown(signalled(controller.shutdown_receiver()));

        tokio::try_join!(async move { ingress.await }, async move { health.await })?;

        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all in-flight requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with in-flight requests remaining"
            );
        }
        Ok(())
    }
}

pub(super) async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))
}

/// Resolves once the shutdown flag flips (or its sender is gone).
async fn signalled(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::event::{BlobContextKeys, BlobEventDecoder};
    use crate::network::HealthState;
    use crate::relay::{dispatch_channel, error_channel};

    fn local_config() -> NetworkConfig {
        NetworkConfig {
            ingress_host: "127.0.0.1".to_string(),
            health_host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        }
    }

    fn module() -> NetworkModule {
        let (dispatch, _drx) = dispatch_channel(4);
        let (errors, _erx) = error_channel(4);
        NetworkModule::new(
            local_config(),
            Arc::new(BlobEventDecoder::new(BlobContextKeys::default())),
            dispatch,
            errors,
        )
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module();
        assert!(module.ingress_listener.is_none());
        assert!(module.health_listener.is_none());
        assert_eq!(
            module.shutdown_controller().health_state(),
            HealthState::Starting
        );
    }

    #[tokio::test]
    async fn start_binds_both_listeners() {
        let mut module = module();
        let ports = module.start().await.unwrap();
        assert!(ports.ingress > 0);
        assert!(ports.health > 0);
        assert_ne!(ports.ingress, ports.health);
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module()
            .serve(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serves_probes_until_shutdown() {
        let mut module = module();
        let ports = module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(module.serve(async move {
            let _ = stop_rx.await;
        }));

        let client = reqwest::Client::new();
        let healthz = client
            .get(format!("http://127.0.0.1:{}/healthz", ports.health))
            .send()
            .await
            .unwrap();
        assert_eq!(healthz.status(), reqwest::StatusCode::OK);
        assert_eq!(healthz.text().await.unwrap(), "{}");

        let readyz = client
            .get(format!("http://127.0.0.1:{}/readyz", ports.health))
            .send()
            .await
            .unwrap();
        assert_eq!(readyz.status(), reqwest::StatusCode::OK);
        drop(client);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve should return after shutdown")
            .unwrap()
            .unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
