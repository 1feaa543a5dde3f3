//! HTTP surfaces: webhook ingress, health probes and the binding router,
//! plus their configuration, middleware and shutdown control.

pub mod binding_server;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use binding_server::{serve_binding, BindingServer};
pub use config::{BindingConfig, NetworkConfig};
pub use handlers::{build_binding_router, AppState};
pub use module::{BoundPorts, NetworkModule};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
