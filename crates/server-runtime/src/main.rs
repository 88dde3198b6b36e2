//! # NETCONF Server
//!
//! Binary entry point. See the library crate for the component layout.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use nc_telemetry::{init_telemetry, TelemetryConfig};
use netconf_server::wiring::spawn_metrics_reporter;
use netconf_server::{NetconfServer, ServerConfig, ServerContainer, TcpTransportListener};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let metrics_enabled = telemetry.metrics_enabled;
    let _telemetry = init_telemetry(telemetry).context("failed to initialize telemetry")?;

    let config = ServerConfig::load().context("failed to load configuration")?;
    let address = config.listener.bind_address();
    let max_frame_bytes = config.listener.max_frame_bytes;

    let container = Arc::new(ServerContainer::new(config).context("failed to build server")?);
    let listener = TcpTransportListener::bind(&address, max_frame_bytes)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        address = %listener.local_addr().context("listener has no local address")?,
        "[Server] NETCONF server listening"
    );

    let server = Arc::new(NetconfServer::new(Arc::clone(&container)));
    let reporter =
        metrics_enabled.then(|| spawn_metrics_reporter(Arc::clone(&container), server.subscribe_shutdown()));

    let accepting = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run(listener).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("[Server] shutdown requested");

    server.shutdown();
    accepting.await.context("accept loop panicked")?;
    if let Some(reporter) = reporter {
        reporter.await.context("metrics reporter panicked")?;
    }
    Ok(())
}
