// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use mcp_hub_core::{ContentBlock, HubRuntime};

use super::ConfigPaths;

/// Connect, invoke one tool, print the result, shut down.
pub async fn run(
    paths: &ConfigPaths,
    tool: &str,
    args: Option<&str>,
    group: Option<&str>,
) -> Result<()> {
    let arguments: serde_json::Value = match args {
        Some(raw) => serde_json::from_str(raw).context("--args must be a JSON object")?,
        None => serde_json::json!({}),
    };

    let config = paths.load()?;
    let runtime = HubRuntime::build(&config)?;
    let (summary, warnings) = runtime.init(&config).await;
    for warning in &warnings {
        warn!("{warning}");
    }
    if summary.failed > 0 {
        warn!(failed = summary.failed, "some servers did not connect");
    }

    let result = runtime
        .hub
        .call_tool(tool, arguments, group, &CancellationToken::new())
        .await;

    for block in &result.content {
        match block {
            ContentBlock::Text { text } => println!("{text}"),
            ContentBlock::Other(value) => println!("{value}"),
        }
    }

    runtime.shutdown().await;
    if result.is_error {
        std::process::exit(1);
    }
    Ok(())
}
