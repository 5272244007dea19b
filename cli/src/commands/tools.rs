// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use tracing::warn;

use mcp_hub_core::HubRuntime;

use super::ConfigPaths;

/// Connect to every backend, then print the tools visible in `group`.
pub async fn run(paths: &ConfigPaths, group: Option<&str>) -> Result<()> {
    let config = paths.load()?;
    let runtime = HubRuntime::build(&config)?;
    let (summary, warnings) = runtime.init(&config).await;
    for warning in &warnings {
        warn!("{warning}");
    }
    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            "some servers did not connect; their tools are missing below"
        );
    }

    let tools = runtime.hub.list_tools(group);
    if tools.is_empty() {
        println!("no tools visible in group {:?}", group.unwrap_or("default"));
    } else {
        for tool in &tools {
            let origin = match &tool.origin {
                mcp_hub_core::ToolOrigin::Backend { server_id } => format!("backend:{server_id}"),
                mcp_hub_core::ToolOrigin::Adapter { tool_id } => format!("adapter:{tool_id}"),
            };
            println!("{:<32} {:<24} {}", tool.name, origin, tool.description);
        }
    }

    runtime.shutdown().await;
    Ok(())
}
