//! `hookrelay` Core — request `Context`, `key=value` `Config`, and their error types.

pub mod config;
pub mod context;
pub mod types;

pub use config::{Config, ConfigError};
pub use context::{Context, ContextError};
pub use types::Value;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
