// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Transport Client Seam
//!
//! The lifecycle manager never talks to the MCP wire protocol directly; it
//! drives a [`McpConnector`] that yields [`McpSession`]s. The production
//! implementation (`infrastructure::mcp_client`) wraps the `rmcp` client
//! transports. Tests inject scripted sessions to exercise reconnect and
//! failure paths without spawning real processes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::error::HubError;
use crate::domain::server::ServerConfig;
use crate::domain::tool::ToolResult;

/// A tool as reported by a backend server, before the hub wraps it.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// One live, initialized connection to a backend MCP server.
///
/// In-flight requests on a single session are serialized by the underlying
/// client; the hub never reorders requests it issues on one session.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// `tools/list` RPC.
    async fn list_tools(&self) -> Result<Vec<BackendToolInfo>, HubError>;

    /// `tools/call` RPC.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, HubError>;

    /// Resolves once the transport has closed, for any reason. Used by the
    /// per-server supervisor to trigger reconnection.
    async fn wait_closed(&self);

    /// Tear the transport down. Idempotent; a second call is a no-op.
    async fn close(&self) -> Result<(), HubError>;
}

/// Factory for [`McpSession`]s.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Spawn/dial the backend described by `config` and complete the MCP
    /// handshake. `resolved_env` is the merged process+config environment
    /// (config wins); only the stdio transport consumes it.
    async fn connect(
        &self,
        config: &ServerConfig,
        resolved_env: &HashMap<String, String>,
    ) -> Result<Box<dyn McpSession>, HubError>;
}
