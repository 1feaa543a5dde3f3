use std::time::Duration;

/// Where and how relay tasks forward contexts downstream.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Full URL of the downstream relay target (the function runtime).
    pub target_url: String,
    /// Upper bound on establishing the TCP connection to the target.
    pub connect_timeout: Duration,
}

impl RelayConfig {
    /// Targets the runtime listening on `localhost:<port>`.
    #[must_use]
    pub fn for_local_port(port: u16) -> Self {
        Self {
            target_url: format!("http://localhost:{port}"),
            ..Self::default()
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:8080".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Admission and concurrency limits between ingress and relay tasks.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bounded capacity of the shared dispatch channel. Submissions beyond it
    /// are rejected as overloaded.
    pub queue_capacity: usize,
    /// Maximum number of relay tasks running at once.
    pub max_concurrent_relays: usize,
    /// Bounded capacity of the non-correlated error channel.
    pub error_channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_concurrent_relays: 256,
            error_channel_capacity: 256,
        }
    }
}
