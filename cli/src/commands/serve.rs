// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use std::net::{Ipv4Addr, SocketAddr};
use tracing::{info, warn};

use mcp_hub_core::HubRuntime;

use super::ConfigPaths;

/// Run the hub in the foreground until Ctrl-C.
pub async fn run(paths: &ConfigPaths, metrics_port: Option<u16>) -> Result<()> {
    if let Some(port) = metrics_port {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("failed to start metrics exporter on {addr}"))?;
        info!(%addr, "metrics exporter listening");
    }

    let config = paths.load()?;
    let runtime = HubRuntime::build(&config)?;
    let (summary, warnings) = runtime.init(&config).await;

    for warning in &warnings {
        warn!("{warning}");
    }
    info!(
        connected = summary.connected,
        failed = summary.failed,
        "hub is serving"
    );
    for (server, error) in &summary.errors {
        warn!(server = %server, "startup failure: {error}");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    runtime.shutdown().await;
    Ok(())
}
