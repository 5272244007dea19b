// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;

use super::ConfigPaths;

/// Parse all config documents and print what a `serve` would warn about.
pub fn run(paths: &ConfigPaths) -> Result<()> {
    let config = paths.load()?;

    println!(
        "servers: {} ({} enabled)",
        config.servers.len(),
        config.servers.iter().filter(|s| s.enabled).count()
    );
    println!("groups:  {}", config.groups.len());
    println!("api tools: {}", config.api_tools.tools.len());

    if config.warnings.is_empty() {
        println!("no warnings");
    } else {
        println!("warnings:");
        for warning in &config.warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}
