//! Standalone listener serving a [`Binding`] on `POST /`.
//!
//! Same two-step lifecycle as [`NetworkModule`](super::NetworkModule):
//! `start()` binds (port 0 allowed) and reports the port, `serve()` runs until
//! the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::BindingConfig;
use super::handlers::build_binding_router;
use super::middleware::build_http_layers;
use super::module::bind;
use crate::traits::Binding;

pub struct BindingServer {
    config: BindingConfig,
    binding: Arc<dyn Binding>,
    listener: Option<TcpListener>,
}

impl BindingServer {
    #[must_use]
    pub fn new(config: BindingConfig, binding: Arc<dyn Binding>) -> Self {
        Self {
            config,
            binding,
            listener: None,
        }
    }

    pub fn build_router(&self) -> Router {
        build_binding_router(Arc::clone(&self.binding)).layer(build_http_layers(
            self.config.max_body_bytes,
            self.config.request_timeout,
        ))
    }

    /// Binds the listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = bind(&self.config.host, self.config.port).await?;
        let port = listener.local_addr()?.port();
        info!(
            bind_address = %format!("{}:{port}", self.config.host),
            "listening"
        );
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves; requests already accepted finish
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("binding server stopped");
        Ok(())
    }
}

/// Binds and serves `binding` until `shutdown` resolves.
///
/// # Errors
///
/// See [`BindingServer::start`] and [`BindingServer::serve`].
pub async fn serve_binding(
    config: BindingConfig,
    binding: Arc<dyn Binding>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let mut server = BindingServer::new(config, binding);
    server.start().await?;
    server.serve(shutdown).await
}
