//! Network configuration for the ingress, health and binding listeners.

use std::time::Duration;

/// Top-level network configuration for the trigger process.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the webhook ingress.
    pub ingress_host: String,
    /// Ingress port (`eventPort`). 0 means OS-assigned.
    pub ingress_port: u16,
    /// Bind address for the liveness/readiness listener.
    pub health_host: String,
    /// Health port. 0 means OS-assigned.
    pub health_port: u16,
    /// Hard upper bound on any single HTTP request.
    pub request_timeout: Duration,
    /// How long an ingress request waits for its relay outcome before
    /// answering 504 and cancelling the relay.
    pub relay_wait_timeout: Duration,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// How long `serve` waits for in-flight ingress requests after shutdown.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ingress_host: "0.0.0.0".to_string(),
            ingress_port: 0,
            health_host: "localhost".to_string(),
            health_port: 0,
            request_timeout: Duration::from_secs(90),
            relay_wait_timeout: Duration::from_secs(60),
            max_body_bytes: 1_048_576, // 1 MiB
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for a standalone binding listener.
#[derive(Debug, Clone)]
pub struct BindingConfig {
    pub host: String,
    /// 0 means OS-assigned.
    pub port: u16,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8082,
            request_timeout: Duration::from_secs(90),
            max_body_bytes: 1_048_576,
        }
    }
}
