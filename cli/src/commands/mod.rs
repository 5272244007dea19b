// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use std::path::PathBuf;

use mcp_hub_core::infrastructure::config_loader::{self, HubConfig};

pub mod call;
pub mod serve;
pub mod tools;
pub mod validate;

/// Where the three config documents live on disk.
pub struct ConfigPaths {
    pub servers: PathBuf,
    pub groups: Option<PathBuf>,
    pub api_tools: Option<PathBuf>,
}

impl ConfigPaths {
    pub fn load(&self) -> Result<HubConfig> {
        config_loader::load_from_paths(
            &self.servers,
            self.groups.as_deref(),
            self.api_tools.as_deref(),
        )
        .with_context(|| format!("failed to load hub config from {}", self.servers.display()))
    }
}
