//! `hookrelay` -- Azure blob-created webhook trigger.
//!
//! Receives Event Grid notifications on `eventPort`, relays each one to the
//! runtime on `localhost:<runtime-port>` and answers the notification with
//! the runtime's result.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use hookrelay_server::cli::{init_tracing, shutdown_signal, Cli, TriggerSettings};
use hookrelay_server::event::BlobEventDecoder;
use hookrelay_server::network::NetworkModule;
use hookrelay_server::relay::{dispatch_channel, error_channel, Dispatcher, Relay};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    let config = cli.config().context("invalid --set entry")?;
    let settings = TriggerSettings::from_config(&config).context("invalid trigger settings")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        event_port = settings.event_port,
        runtime_port = cli.runtime_port,
        "starting hookrelay"
    );

    let dispatch_config = cli.dispatch_config();
    let (dispatch_tx, dispatch_rx) = dispatch_channel(dispatch_config.queue_capacity);
    let (error_tx, error_rx) = error_channel(dispatch_config.error_channel_capacity);

    let relay = Relay::new(&cli.relay_config())?;
    let mut dispatcher = Dispatcher::new(relay, &dispatch_config).start(dispatch_rx, error_rx);

    let mut network = NetworkModule::new(
        cli.network_config(&settings),
        Arc::new(BlobEventDecoder::new(settings.keys)),
        dispatch_tx,
        error_tx,
    );
    network.start().await?;

    let outcome = network.serve(shutdown_signal()).await;
    if let Err(err) = &outcome {
        error!(error = %format!("{err:#}"), "server stopped unexpectedly");
    }

    dispatcher.stop().await;
    info!("hookrelay stopped");
    outcome
}
