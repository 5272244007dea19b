// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Tool Value Objects
//!
//! A [`Tool`] is a named, typed callable visible through the hub. It either
//! lives on a backend MCP server or is synthesized by the API adapter; the
//! [`ToolOrigin`] discriminator records which. Results are returned as a
//! [`ToolResult`] holding tagged [`ContentBlock`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::domain::error::HubError;

/// Reserved server id that owns every adapter-synthesized tool.
///
/// Groups opt into adapter tools by listing this id in their `servers` set,
/// exactly as they would a configured backend.
pub const ADAPTER_SOURCE_ID: &str = "api-tools";

/// Where a tool executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolOrigin {
    /// Reported by a connected backend MCP server.
    Backend {
        #[serde(rename = "serverId")]
        server_id: String,
    },
    /// Synthesized from an `api-tools.json` entry.
    Adapter {
        #[serde(rename = "toolId")]
        tool_id: String,
    },
}

impl ToolOrigin {
    /// The server id this tool counts against for group membership.
    /// Adapter tools belong to the reserved [`ADAPTER_SOURCE_ID`].
    pub fn source_id(&self) -> &str {
        match self {
            Self::Backend { server_id } => server_id,
            Self::Adapter { .. } => ADAPTER_SOURCE_ID,
        }
    }

    pub fn is_adapter(&self) -> bool {
        matches!(self, Self::Adapter { .. })
    }
}

/// Uniform tool descriptor, independent of origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON-Schema object describing the tool's arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    pub origin: ToolOrigin,
}

/// Tool names must match `[A-Za-z0-9_-]+`.
pub fn is_valid_tool_name(name: &str) -> bool {
    static NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_-]+$").expect("tool name pattern is valid")
    });
    re.is_match(name)
}

/// One element of a tool result. Only `text` is interpreted by the hub;
/// every other kind passes through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(untagged)]
    Other(Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Other(_) => None,
        }
    }
}

/// Outcome of a tool invocation as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// Joined text of all `text` blocks. Convenience for logs and tests.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<HubError> for ToolResult {
    /// Failure shape: `{isError:true, content:[text:"<category>: <detail>"]}`.
    fn from(err: HubError) -> Self {
        Self::error_text(err.to_string())
    }
}
