// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Tool Registry
//!
//! In-memory index of every tool the hub can currently serve, keyed by
//! name. Mutations emit [`RegistryEvent`]s delivered *synchronously* to the
//! subscribed observers; an observer error is logged and never aborts the
//! others, and never fails the mutation itself.
//!
//! Ownership rule: a backend's tools are unregistered before its connection
//! is torn down, so a tool name never outlives its source.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::error::{ErrorCode, HubError};
use crate::domain::events::RegistryEvent;
use crate::domain::tool::{is_valid_tool_name, Tool};
use crate::infrastructure::event_bus::EventBus;

/// Synchronous registry observer.
pub trait RegistryObserver: Send + Sync {
    fn on_event(&self, event: &RegistryEvent) -> Result<(), HubError>;
}

/// Built-in observer that forwards registry events onto the broadcast bus.
pub struct EventBusForwarder {
    bus: EventBus,
}

impl EventBusForwarder {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl RegistryObserver for EventBusForwarder {
    fn on_event(&self, event: &RegistryEvent) -> Result<(), HubError> {
        self.bus.publish_registry_event(event.clone());
        Ok(())
    }
}

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Tool>>,
    observers: RwLock<Vec<Arc<dyn RegistryObserver>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn RegistryObserver>) {
        self.observers.write().push(observer);
    }

    /// Insert or silently replace. Rejects names that are empty or outside
    /// `[A-Za-z0-9_-]+`.
    pub fn register(&self, tool: Tool) -> Result<(), HubError> {
        if !is_valid_tool_name(&tool.name) {
            return Err(HubError::new(
                ErrorCode::InvalidValue,
                format!(
                    "tool name {:?} is invalid: must match [A-Za-z0-9_-]+",
                    tool.name
                ),
            ));
        }

        let replaced = self
            .tools
            .write()
            .insert(tool.name.clone(), tool.clone())
            .is_some();

        let event = if replaced {
            RegistryEvent::Updated { tool }
        } else {
            RegistryEvent::Added { tool }
        };
        self.notify(&event);
        Ok(())
    }

    /// Remove by name; false when the name was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.tools.write().remove(name).is_some();
        if removed {
            self.notify(&RegistryEvent::Removed {
                name: name.to_string(),
            });
        }
        removed
    }

    /// Remove every tool owned by `source_id` (a backend server id or the
    /// adapter source). Returns how many were removed.
    pub fn unregister_source(&self, source_id: &str) -> usize {
        let names: Vec<String> = {
            let tools = self.tools.read();
            tools
                .values()
                .filter(|t| t.origin.source_id() == source_id)
                .map(|t| t.name.clone())
                .collect()
        };
        let mut removed = 0;
        for name in names {
            if self.unregister(&name) {
                removed += 1;
            }
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.tools.read().get(name).cloned()
    }

    /// Every registered tool, sorted by name for stable output.
    pub fn list(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.read().values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn filter(&self, predicate: impl Fn(&Tool) -> bool) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self
            .tools
            .read()
            .values()
            .filter(|t| predicate(t))
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    pub fn clear(&self) {
        self.tools.write().clear();
        self.notify(&RegistryEvent::Cleared);
    }

    fn notify(&self, event: &RegistryEvent) {
        // Snapshot outside the tools lock; observers may call back into the
        // registry.
        let observers: Vec<Arc<dyn RegistryObserver>> = self.observers.read().clone();
        for observer in observers {
            if let Err(err) = observer.on_event(event) {
                warn!(
                    event = ?event.tool_name(),
                    error = %err,
                    "registry observer failed; continuing with remaining observers"
                );
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::ToolOrigin;
    use parking_lot::Mutex;
    use serde_json::json;

    fn tool(name: &str, server: &str) -> Tool {
        Tool {
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
            origin: ToolOrigin::Backend {
                server_id: server.into(),
            },
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RegistryObserver for RecordingObserver {
        fn on_event(&self, event: &RegistryEvent) -> Result<(), HubError> {
            let label = match event {
                RegistryEvent::Added { tool } => format!("added:{}", tool.name),
                RegistryEvent::Updated { tool } => format!("updated:{}", tool.name),
                RegistryEvent::Removed { name } => format!("removed:{name}"),
                RegistryEvent::Cleared => "cleared".to_string(),
            };
            self.events.lock().push(label);
            if self.fail {
                Err(HubError::new(ErrorCode::Internal, "observer exploded"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_register_get_unregister_round_trip() {
        let registry = ToolRegistry::new();
        registry.register(tool("toolA", "srv1")).unwrap();
        assert_eq!(registry.get("toolA").unwrap().name, "toolA");

        assert!(registry.unregister("toolA"));
        assert!(registry.get("toolA").is_none());
        assert!(!registry.unregister("toolA"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registry = ToolRegistry::new();
        assert!(registry.register(tool("", "srv1")).is_err());
        assert!(registry.register(tool("has space", "srv1")).is_err());
        assert!(registry.register(tool("ok_name-2", "srv1")).is_ok());
    }

    #[test]
    fn test_replace_emits_updated() {
        let registry = ToolRegistry::new();
        let observer = Arc::new(RecordingObserver::default());
        registry.subscribe(observer.clone());

        registry.register(tool("t", "srv1")).unwrap();
        registry.register(tool("t", "srv2")).unwrap();

        let events = observer.events.lock().clone();
        assert_eq!(events, vec!["added:t", "updated:t"]);
        // replacement wins
        assert_eq!(registry.get("t").unwrap().origin.source_id(), "srv2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failing_observer_does_not_abort_others() {
        let registry = ToolRegistry::new();
        let failing = Arc::new(RecordingObserver {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(RecordingObserver::default());
        registry.subscribe(failing.clone());
        registry.subscribe(healthy.clone());

        registry.register(tool("t", "srv1")).unwrap();

        assert_eq!(failing.events.lock().len(), 1);
        assert_eq!(healthy.events.lock().len(), 1);
        assert!(registry.get("t").is_some());
    }

    #[test]
    fn test_unregister_source_removes_only_that_backend() {
        let registry = ToolRegistry::new();
        registry.register(tool("a", "srv1")).unwrap();
        registry.register(tool("b", "srv1")).unwrap();
        registry.register(tool("c", "srv2")).unwrap();

        assert_eq!(registry.unregister_source("srv1"), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("c").is_some());
    }

    #[test]
    fn test_clear_emits_cleared() {
        let registry = ToolRegistry::new();
        let observer = Arc::new(RecordingObserver::default());
        registry.register(tool("t", "srv1")).unwrap();
        registry.subscribe(observer.clone());

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(observer.events.lock().clone(), vec!["cleared"]);
    }

    #[test]
    fn test_filter_by_origin() {
        let registry = ToolRegistry::new();
        registry.register(tool("a", "srv1")).unwrap();
        registry.register(tool("b", "srv2")).unwrap();
        let from_srv1 = registry.filter(|t| t.origin.source_id() == "srv1");
        assert_eq!(from_srv1.len(), 1);
        assert_eq!(from_srv1[0].name, "a");
    }
}
