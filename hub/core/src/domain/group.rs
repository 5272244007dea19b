// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Group Policy
//!
//! A [`Group`] scopes which tools a frontend may see and call. Visibility is
//! declarative: a group names the server ids it trusts and, optionally, an
//! explicit tool allow-list that intersects with those servers' tools.

use serde::{Deserialize, Serialize};

use crate::domain::tool::Tool;

/// Group id used when a caller does not name one.
pub const DEFAULT_GROUP_ID: &str = "default";

/// Declarative visibility policy, parsed from `group.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Server ids whose tools this group exposes. May include the reserved
    /// adapter source id to expose adapter tools.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Explicit tool-name allow-list. Empty means "every tool of the listed
    /// servers".
    #[serde(default)]
    pub tools: Vec<String>,
}

impl Group {
    pub fn contains_server(&self, server_id: &str) -> bool {
        self.servers.iter().any(|s| s == server_id)
    }

    /// Membership predicate: the tool's source server must be listed, and
    /// either the allow-list is empty or it names the tool.
    pub fn allows(&self, tool: &Tool) -> bool {
        self.contains_server(tool.origin.source_id())
            && (self.tools.is_empty() || self.tools.iter().any(|t| t == &tool.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::{ToolOrigin, ADAPTER_SOURCE_ID};
    use serde_json::json;

    fn backend_tool(name: &str, server: &str) -> Tool {
        Tool {
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
            origin: ToolOrigin::Backend {
                server_id: server.into(),
            },
        }
    }

    #[test]
    fn test_empty_allow_list_exposes_all_server_tools() {
        let group = Group {
            id: "g".into(),
            name: None,
            servers: vec!["srv1".into()],
            tools: vec![],
        };
        assert!(group.allows(&backend_tool("a", "srv1")));
        assert!(!group.allows(&backend_tool("a", "srv2")));
    }

    #[test]
    fn test_allow_list_intersects() {
        let group = Group {
            id: "g".into(),
            name: None,
            servers: vec!["srv1".into()],
            tools: vec!["a".into()],
        };
        assert!(group.allows(&backend_tool("a", "srv1")));
        assert!(!group.allows(&backend_tool("b", "srv1")));
    }

    #[test]
    fn test_adapter_tools_need_explicit_source() {
        let adapter_tool = Tool {
            name: "weather".into(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
            origin: ToolOrigin::Adapter {
                tool_id: "weather".into(),
            },
        };

        let without = Group {
            id: "g".into(),
            name: None,
            servers: vec!["srv1".into()],
            tools: vec![],
        };
        assert!(!without.allows(&adapter_tool));

        let with = Group {
            id: "g".into(),
            name: None,
            servers: vec![ADAPTER_SOURCE_ID.into()],
            tools: vec![],
        };
        assert!(with.allows(&adapter_tool));
    }
}
