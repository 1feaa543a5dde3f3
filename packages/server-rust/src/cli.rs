//! Command-line surfaces and process bootstrap helpers: [`Cli`] for the
//! `hookrelay` trigger and [`BindingCli`] / [`run_binding`] for binding
//! processes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use hookrelay_core::{Config, ConfigError};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::event::BlobContextKeys;
use crate::network::{serve_binding, BindingConfig, NetworkConfig};
use crate::relay::{DispatchConfig, RelayConfig};
use crate::traits::Binding;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Webhook trigger that relays Azure blob-created events to a local runtime
/// and answers each event with its correlated result.
#[derive(Debug, Parser)]
#[command(name = "hookrelay", version)]
pub struct Cli {
    /// Port the downstream runtime listens on (localhost).
    #[arg(short = 'r', long, env = "HOOKRELAY_RUNTIME_PORT", default_value_t = 8080)]
    pub runtime_port: u16,

    /// Port for the health endpoints (localhost).
    #[arg(short, long, env = "HOOKRELAY_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Configure the trigger using key=value pairs; may be repeated.
    #[arg(short, long = "set", value_name = "KEY=VALUE", env = "HOOKRELAY_SET")]
    pub set: Vec<String>,

    #[arg(long, env = "HOOKRELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "HOOKRELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Seconds an event waits for its relay before answering 504.
    #[arg(long, env = "HOOKRELAY_RELAY_TIMEOUT_SECS", default_value_t = 60)]
    pub relay_timeout_secs: u64,

    /// Seconds allowed for connecting to the runtime.
    #[arg(long, env = "HOOKRELAY_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Events that may wait for a relay slot before ingress answers 503.
    #[arg(long, env = "HOOKRELAY_QUEUE_CAPACITY", default_value_t = 1024)]
    pub queue_capacity: usize,

    #[arg(long, env = "HOOKRELAY_MAX_CONCURRENT_RELAYS", default_value_t = 256)]
    pub max_concurrent_relays: usize,
}

impl Cli {
    /// Builds the settings store from the `--set` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedSetting`] for an entry without `=`.
    pub fn config(&self) -> Result<Config, ConfigError> {
        Config::from_pairs(&self.set)
    }

    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..RelayConfig::for_local_port(self.runtime_port)
        }
    }

    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: self.queue_capacity,
            max_concurrent_relays: self.max_concurrent_relays,
            ..DispatchConfig::default()
        }
    }

    #[must_use]
    pub fn network_config(&self, settings: &TriggerSettings) -> NetworkConfig {
        let relay_wait_timeout = Duration::from_secs(self.relay_timeout_secs);
        let defaults = NetworkConfig::default();
        NetworkConfig {
            ingress_port: settings.event_port,
            health_port: self.port,
            request_timeout: defaults
                .request_timeout
                .max(relay_wait_timeout + Duration::from_secs(5)),
            relay_wait_timeout,
            ..defaults
        }
    }
}

/// Trigger settings read from the `--set` store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSettings {
    /// Port the webhook ingress listens on.
    pub event_port: u16,
    pub keys: BlobContextKeys,
}

impl TriggerSettings {
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `eventPort` was not given and
    /// [`ConfigError::Invalid`] when it is not a port number.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.require("eventPort")?;
        let event_port = config
            .parse::<u16>("eventPort")?
            .ok_or_else(|| ConfigError::Missing {
                key: "eventPort".to_string(),
            })?;
        Ok(Self {
            event_port,
            keys: BlobContextKeys::from_config(config),
        })
    }
}

/// Command line of a binding process.
#[derive(Debug, Parser)]
#[command(version)]
pub struct BindingCli {
    /// Port to listen on (localhost).
    #[arg(short, long, env = "HOOKRELAY_BINDING_PORT", default_value_t = 8082)]
    pub port: u16,

    /// Configure the binding using key=value pairs; may be repeated.
    #[arg(short, long = "set", value_name = "KEY=VALUE", env = "HOOKRELAY_BINDING_SET")]
    pub set: Vec<String>,

    #[arg(long, alias = "ll", env = "HOOKRELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "HOOKRELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl BindingCli {
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedSetting`] for an entry without `=`.
    pub fn config(&self) -> Result<Config, ConfigError> {
        Config::from_pairs(&self.set)
    }

    #[must_use]
    pub fn binding_config(&self) -> BindingConfig {
        BindingConfig {
            port: self.port,
            ..BindingConfig::default()
        }
    }
}

/// Builds a binding from the `--set` store with `init` and serves it until
/// `shutdown` resolves.
///
/// Logging is left to the caller (see [`init_tracing`]).
///
/// # Errors
///
/// Returns an error for a malformed `--set` entry, when `init` fails, or when
/// the listener cannot be bound or served.
pub async fn run_binding<B, F>(
    cli: &BindingCli,
    init: F,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()>
where
    B: Binding,
    F: FnOnce(&Config) -> anyhow::Result<B>,
{
    let config = cli.config().context("invalid --set entry")?;
    let binding = init(&config).context("error initializing binding")?;
    info!(port = cli.port, "starting binding");
    serve_binding(cli.binding_config(), Arc::new(binding), shutdown).await
}

/// Resolves on Ctrl-C. If the signal cannot be installed, never resolves.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hookrelay_core::Context;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hookrelay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.runtime_port, 8080);
        assert_eq!(cli.port, 8081);
        assert!(cli.set.is_empty());
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.relay_config().target_url, "http://localhost:8080");
        assert_eq!(cli.dispatch_config().queue_capacity, 1024);
    }

    #[test]
    fn short_flags_and_repeated_settings() {
        let cli = parse(&[
            "-r", "9000", "-p", "9001", "-s", "eventPort=7000", "-s", "accountContextKey=acct",
            "--log-format", "json",
        ]);
        assert_eq!(cli.relay_config().target_url, "http://localhost:9000");
        assert_eq!(cli.port, 9001);
        assert_eq!(cli.log_format, LogFormat::Json);

        let settings = TriggerSettings::from_config(&cli.config().unwrap()).unwrap();
        assert_eq!(settings.event_port, 7000);
        assert_eq!(settings.keys.account, "acct");

        let network = cli.network_config(&settings);
        assert_eq!(network.ingress_port, 7000);
        assert_eq!(network.health_port, 9001);
        assert!(network.request_timeout > network.relay_wait_timeout);
    }

    #[test]
    fn malformed_setting_is_rejected() {
        let cli = parse(&["--set", "noequals"]);
        assert_eq!(
            cli.config().unwrap_err(),
            ConfigError::MalformedSetting("noequals".to_string())
        );
    }

    #[test]
    fn event_port_is_required() {
        let err = TriggerSettings::from_config(&Config::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: "eventPort".to_string()
            }
        );
    }

    #[test]
    fn binding_cli_flags() {
        let cli = BindingCli::try_parse_from(["binding"]).unwrap();
        assert_eq!(cli.port, 8082);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.binding_config().host, "localhost");

        let cli = BindingCli::try_parse_from([
            "binding", "-p", "9100", "-s", "container=box", "--ll", "debug",
        ])
        .unwrap();
        assert_eq!(cli.binding_config().port, 9100);
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.config().unwrap().get_setting("container", ""), "box");
    }

    struct Noop;

    #[async_trait::async_trait]
    impl Binding for Noop {
        async fn bind(&self, _ctx: &mut Context) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_binding_hands_settings_to_init() {
        let cli = BindingCli::try_parse_from(["binding", "-s", "container=box"]).unwrap();
        let err = run_binding(
            &cli,
            |config: &Config| -> anyhow::Result<Noop> {
                anyhow::bail!("container {} is not allowed", config.get_setting("container", ""))
            },
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "error initializing binding: container box is not allowed"
        );
    }

    #[tokio::test]
    async fn run_binding_rejects_malformed_settings() {
        let cli = BindingCli::try_parse_from(["binding", "-s", "noequals"]).unwrap();
        let err = run_binding(&cli, |_: &Config| Ok(Noop), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid --set entry"));
    }

    #[tokio::test]
    async fn run_binding_serves_until_shutdown() {
        let cli = BindingCli::try_parse_from(["binding", "-p", "0"]).unwrap();
        run_binding(&cli, |_: &Config| Ok(Noop), async {})
            .await
            .unwrap();
    }

    #[test]
    fn event_port_must_be_a_port_number() {
        let config = Config::from_pairs(["eventPort=http"]).unwrap();
        let err = TriggerSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "eventPort"));
    }
}
