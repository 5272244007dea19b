// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Config Loader
//!
//! Parses the three persisted documents (`mcp_server.json`, `group.json`,
//! `api-tools.json`) into an immutable [`HubConfig`] snapshot. Persistence
//! and hot-reload watching belong to collaborators; the loader only turns
//! bytes into domain structs, degrading gracefully: a malformed entry is
//! skipped with a warning, only an unreadable document is a hard error.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::domain::api_tool::ApiToolsDoc;
use crate::domain::error::{ErrorCode, HubError};
use crate::domain::group::{Group, DEFAULT_GROUP_ID};
use crate::domain::server::{ServerConfig, TransportType};
use crate::domain::tool::ADAPTER_SOURCE_ID;

/// Immutable configuration snapshot consumed by the runtime.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub servers: Vec<ServerConfig>,
    pub groups: Vec<Group>,
    pub api_tools: ApiToolsDoc,
    pub warnings: Vec<String>,
}

impl HubConfig {
    pub fn empty() -> Self {
        Self {
            servers: Vec::new(),
            groups: Vec::new(),
            api_tools: ApiToolsDoc {
                version: "1.0".into(),
                tools: Vec::new(),
            },
            warnings: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct ServerDoc {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct ServerEntry {
    #[serde(flatten)]
    transport: TransportType,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
struct GroupEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    servers: Vec<String>,
    #[serde(default)]
    tools: Vec<String>,
}

/// Parse `mcp_server.json`. Malformed entries are skipped with a warning.
pub fn parse_server_doc(raw: &Value) -> Result<(Vec<ServerConfig>, Vec<String>), HubError> {
    let doc: ServerDoc = serde_json::from_value(raw.clone()).map_err(|e| {
        HubError::new(
            ErrorCode::InvalidServerConfig,
            format!("mcp_server.json is malformed: {e}"),
        )
    })?;

    let mut servers = Vec::new();
    let mut warnings = Vec::new();
    let mut ids: Vec<&String> = doc.mcp_servers.keys().collect();
    ids.sort();
    for id in ids {
        if id == ADAPTER_SOURCE_ID {
            warnings.push(format!(
                "server id {ADAPTER_SOURCE_ID:?} is reserved for adapter tools, entry skipped"
            ));
            continue;
        }
        match serde_json::from_value::<ServerEntry>(doc.mcp_servers[id].clone()) {
            Ok(entry) => servers.push(ServerConfig {
                id: id.clone(),
                transport: entry.transport,
                enabled: entry.enabled,
            }),
            Err(e) => warnings.push(format!("server {id:?} skipped: {e}")),
        }
    }
    Ok((servers, warnings))
}

/// Parse `group.json`. The map key is the authoritative group id.
pub fn parse_group_doc(raw: &Value) -> Result<(Vec<Group>, Vec<String>), HubError> {
    let doc: HashMap<String, Value> = serde_json::from_value(raw.clone()).map_err(|e| {
        HubError::new(
            ErrorCode::InvalidGroupConfig,
            format!("group.json is malformed: {e}"),
        )
    })?;

    let mut groups = Vec::new();
    let mut warnings = Vec::new();
    let mut ids: Vec<&String> = doc.keys().collect();
    ids.sort();
    for id in ids {
        match serde_json::from_value::<GroupEntry>(doc[id].clone()) {
            Ok(entry) => {
                if let Some(inner) = &entry.id {
                    if inner != id {
                        warnings.push(format!(
                            "group {id:?} declares mismatching id {inner:?}; the key wins"
                        ));
                    }
                }
                groups.push(Group {
                    id: id.clone(),
                    name: entry.name,
                    servers: entry.servers,
                    tools: entry.tools,
                });
            }
            Err(e) => warnings.push(format!("group {id:?} skipped: {e}")),
        }
    }
    Ok((groups, warnings))
}

/// Parse `api-tools.json`.
pub fn parse_api_tools_doc(raw: &Value) -> Result<ApiToolsDoc, HubError> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        HubError::new(
            ErrorCode::SchemaViolation,
            format!("api-tools.json is malformed: {e}"),
        )
    })
}

/// When no `default` group is configured, synthesize one exposing every
/// configured server plus the adapter source, so a fresh hub is usable
/// without a group document.
pub fn ensure_default_group(groups: &mut Vec<Group>, servers: &[ServerConfig]) {
    if groups.iter().any(|g| g.id == DEFAULT_GROUP_ID) {
        return;
    }
    let mut server_ids: Vec<String> = servers.iter().map(|s| s.id.clone()).collect();
    server_ids.push(ADAPTER_SOURCE_ID.to_string());
    groups.push(Group {
        id: DEFAULT_GROUP_ID.to_string(),
        name: Some("Default group".to_string()),
        servers: server_ids,
        tools: Vec::new(),
    });
}

fn read_json(path: &Path) -> Result<Value, HubError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        HubError::new(
            ErrorCode::MissingConfigFile,
            format!("cannot read {}: {e}", path.display()),
        )
    })?;
    serde_json::from_str(&text).map_err(|e| {
        HubError::new(
            ErrorCode::SchemaViolation,
            format!("{} is not valid JSON: {e}", path.display()),
        )
    })
}

/// Load a full snapshot from disk. `group_path` and `api_tools_path` are
/// optional documents; the server document is required.
pub fn load_from_paths(
    server_path: &Path,
    group_path: Option<&Path>,
    api_tools_path: Option<&Path>,
) -> Result<HubConfig, HubError> {
    let mut warnings = Vec::new();

    let (servers, mut server_warnings) = parse_server_doc(&read_json(server_path)?)?;
    warnings.append(&mut server_warnings);

    let mut groups = Vec::new();
    if let Some(path) = group_path {
        let (parsed, mut group_warnings) = parse_group_doc(&read_json(path)?)?;
        groups = parsed;
        warnings.append(&mut group_warnings);
    }
    ensure_default_group(&mut groups, &servers);

    let api_tools = match api_tools_path {
        Some(path) => parse_api_tools_doc(&read_json(path)?)?,
        None => ApiToolsDoc {
            version: "1.0".into(),
            tools: Vec::new(),
        },
    };

    for warning in &warnings {
        warn!("{warning}");
    }

    Ok(HubConfig {
        servers,
        groups,
        api_tools,
        warnings,
    })
}
