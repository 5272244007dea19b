// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Domain Events
//!
//! Events emitted by the registry, the connection manager, and the hub
//! service. Registry events are additionally delivered synchronously to
//! registry observers; everything here also flows through the broadcast
//! event bus for subscribers (CLI, diagnostics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::server::ServerStatus;
use crate::domain::tool::Tool;

/// Tool registry mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    Added { tool: Tool },
    Updated { tool: Tool },
    Removed { name: String },
    Cleared,
}

impl RegistryEvent {
    /// Tool name the event concerns, when there is one.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::Added { tool } | Self::Updated { tool } => Some(&tool.name),
            Self::Removed { name } => Some(name),
            Self::Cleared => None,
        }
    }
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    StatusChanged {
        server_id: String,
        status: ServerStatus,
        at: DateTime<Utc>,
    },
    ToolsDiscovered {
        server_id: String,
        count: usize,
    },
    ReconnectScheduled {
        server_id: String,
        attempt: u32,
        delay_ms: u64,
    },
}

/// One completed `CallTool`, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvocationEvent {
    Completed {
        tool_name: String,
        group_id: String,
        /// `"backend"` or `"adapter"`.
        origin: String,
        duration_ms: u64,
        is_error: bool,
    },
}
