//! # omni-backend
//!
//! Relay server binary. Loads settings, starts the broker consumer in the
//! background, and serves the WebSocket fan-out until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use omni_relay::broker::amqp::redact_url;
use omni_relay::{
    AmqpConnector, BackoffPolicy, BrokerConsumer, ConnectionRegistry, RelayPipeline, RelayServer,
    ServerConfig, ShutdownCoordinator, Topology,
};
use omni_settings::RelaySettings;

/// Omni relay: broker events to WebSocket clients.
#[derive(Parser, Debug)]
#[command(name = "omni-backend", about = "OmniQuant data relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// AMQP broker URL (overrides settings and `RABBITMQ_URL`).
    #[arg(long)]
    broker_url: Option<String>,

    /// Settings file (default `~/.omni/relay.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn settings_file(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(omni_settings::settings_path)
    }

    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(url) = &self.broker_url {
            settings.broker.url.clone_from(url);
        }
    }
}

fn build_settings<F>(cli: &Cli, path: &Path, env: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = omni_settings::load_settings_with(path, env)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = build_settings(&cli, &cli.settings_file(), |name| std::env::var(name).ok())?;

    omni_logging::init_subscriber(settings.logging.level, settings.logging.format);

    let metrics_handle = match omni_relay::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let mut server = RelayServer::new(
        ServerConfig::from(&settings.server),
        Arc::clone(&registry),
        Arc::clone(&shutdown),
    );
    if let Some(handle) = metrics_handle {
        server = server.with_metrics(handle);
    }

    tracing::info!(
        broker = %redact_url(&settings.broker.url),
        exchange = %settings.broker.exchange,
        binding_key = %settings.broker.binding_key,
        "starting broker consumer"
    );
    let consumer_handle = BrokerConsumer::new(
        Arc::new(AmqpConnector::new(settings.broker.url.clone())),
        Topology::from(&settings.broker),
        BackoffPolicy::from(&settings.broker.reconnect),
        RelayPipeline::new(Arc::clone(&registry)),
    )
    .spawn(shutdown.ingest_token());

    let (addr, server_handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;
    tracing::info!("OmniQuant relay listening on http://{addr} (ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let report = shutdown
        .graceful_shutdown(consumer_handle, server_handle, None)
        .await;
    tracing::info!(
        consumer_drained = report.consumer_drained,
        server_drained = report.server_drained,
        "Shutdown complete"
    );
    Ok(())
}
