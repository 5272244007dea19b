// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Group Resolver
//!
//! Evaluates group membership against the live registry. Group config is an
//! immutable snapshot swapped wholesale on reload; reads take the lock only
//! long enough to clone the group they need.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use crate::domain::group::{Group, DEFAULT_GROUP_ID};
use crate::domain::tool::{Tool, ADAPTER_SOURCE_ID};
use crate::infrastructure::registry::ToolRegistry;

pub struct GroupResolver {
    registry: Arc<ToolRegistry>,
    groups: RwLock<HashMap<String, Group>>,
}

impl GroupResolver {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Swap in a new group snapshot (startup and reload).
    pub fn load(&self, groups: Vec<Group>) {
        let map = groups.into_iter().map(|g| (g.id.clone(), g)).collect();
        *self.groups.write() = map;
    }

    pub fn group(&self, id: &str) -> Option<Group> {
        self.groups.read().get(id).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    /// Tools visible in `group_id` (the literal `"default"` when absent).
    /// An unknown group yields an empty list with a warning, not an error.
    pub fn visible_tools(&self, group_id: Option<&str>) -> Vec<Tool> {
        let id = group_id.unwrap_or(DEFAULT_GROUP_ID);
        let Some(group) = self.group(id) else {
            warn!(group = %id, "unknown group requested, returning no tools");
            return Vec::new();
        };
        self.registry.filter(|tool| group.allows(tool))
    }

    /// True iff the tool appears in the group's visible set.
    pub fn can_call(&self, group_id: Option<&str>, tool_name: &str) -> bool {
        let id = group_id.unwrap_or(DEFAULT_GROUP_ID);
        let Some(group) = self.group(id) else {
            return false;
        };
        self.registry
            .get(tool_name)
            .map(|tool| group.allows(&tool))
            .unwrap_or(false)
    }

    /// Report groups that reference unknown server ids. Such groups stay
    /// usable; the unknown ids simply never match a tool.
    pub fn validate_references(&self, known_server_ids: &HashSet<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        for group in self.groups.read().values() {
            for server_id in &group.servers {
                if server_id != ADAPTER_SOURCE_ID && !known_server_ids.contains(server_id) {
                    let warning = format!(
                        "group {:?} references unknown server {:?}",
                        group.id, server_id
                    );
                    warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }
        warnings
    }
}
