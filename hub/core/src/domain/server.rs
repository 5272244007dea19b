// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Backend Server Descriptors
//!
//! [`ServerConfig`] is the immutable descriptor of one backend MCP server,
//! parsed from `mcp_server.json`. [`ServerStatus`] is the connection state
//! machine driven by the lifecycle manager:
//!
//! ```text
//!            initialize           connect ok
//!  Off ─────────────────▶ Connecting ────────▶ Connected
//!                            │                    │
//!                            │ connect fail       │ transport close / error
//!                            ▼                    ▼
//!                          Error  ◀───────── reconnecting (backoff)
//! ```
//!
//! Only `Connected` accepts dispatch. External code observes connections
//! through [`ServerSnapshot`]s; it never holds the live connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transport-specific part of a server config, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportType {
    #[serde(rename = "stdio")]
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    #[serde(rename = "sse")]
    Sse {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    #[serde(rename = "streamable-http")]
    StreamableHttp {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl TransportType {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Sse { .. } => "sse",
            Self::StreamableHttp { .. } => "streamable-http",
        }
    }
}

/// Immutable descriptor of one configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    #[serde(flatten)]
    pub transport: TransportType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Connection state. Only `Connected` accepts dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ServerStatus {
    pub fn is_dispatchable(self) -> bool {
        self == Self::Connected
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Read-only view of one connection's runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSnapshot {
    pub id: String,
    pub transport: String,
    pub status: ServerStatus,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
    /// Number of tools last reported by the backend. May be stale when the
    /// server is not `Connected`; the cached list is kept for inspection.
    pub tool_count: usize,
}

/// Outcome of `initialize`: which servers came up and which did not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitSummary {
    pub connected: usize,
    pub failed: usize,
    /// Startup error message per failed server id.
    pub errors: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stdio_config_parses() {
        let raw = json!({
            "id": "fs",
            "type": "stdio",
            "command": "npx",
            "args": ["-y", "@modelcontextprotocol/server-filesystem"],
            "env": {"ROOT": "/tmp"},
            "enabled": true
        });
        let config: ServerConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.id, "fs");
        assert!(config.enabled);
        match config.transport {
            TransportType::Stdio { command, args, env } => {
                assert_eq!(command, "npx");
                assert_eq!(args.len(), 2);
                assert_eq!(env.get("ROOT").map(String::as_str), Some("/tmp"));
            }
            other => panic!("expected stdio transport, got {:?}", other),
        }
    }

    #[test]
    fn test_streamable_http_config_parses() {
        let raw = json!({
            "id": "remote",
            "type": "streamable-http",
            "url": "https://tools.example.com/mcp",
            "headers": {"Authorization": "Bearer abc"}
        });
        let config: ServerConfig = serde_json::from_value(raw).unwrap();
        // enabled defaults to true when omitted
        assert!(config.enabled);
        assert_eq!(config.transport.kind(), "streamable-http");
    }

    #[test]
    fn test_only_connected_is_dispatchable() {
        assert!(ServerStatus::Connected.is_dispatchable());
        for status in [
            ServerStatus::Disconnected,
            ServerStatus::Connecting,
            ServerStatus::Error,
        ] {
            assert!(!status.is_dispatchable());
        }
    }
}
