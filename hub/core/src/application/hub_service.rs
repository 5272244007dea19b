// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Hub Service
//!
//! Top-level façade consumed by the transport layer. `call_tool` resolves
//! the group, gates visibility through the resolver, then routes to the
//! owning backend connection or the adapter. Every failure surfaces as an
//! error [`ToolResult`] with a `<category>: <detail>` text block; internal
//! context never leaks to callers.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::adapter::ApiToolAdapter;
use crate::application::group_resolver::GroupResolver;
use crate::domain::error::{ErrorCode, HubError};
use crate::domain::events::InvocationEvent;
use crate::domain::group::DEFAULT_GROUP_ID;
use crate::domain::server::ServerSnapshot;
use crate::domain::tool::{Tool, ToolOrigin, ToolResult};
use crate::infrastructure::connection_manager::ConnectionManager;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::registry::ToolRegistry;
use crate::infrastructure::tracer::{MessageKind, MessageRecord, MessageTracer};

/// Aggregated hub status for operators.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub servers: ServerDiagnostics,
    pub groups: GroupDiagnostics,
    pub tools: ToolDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerDiagnostics {
    pub total: usize,
    pub connected: usize,
    pub details: Vec<ServerSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDiagnostics {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDiagnostics {
    pub total: usize,
}

pub struct HubService {
    registry: Arc<ToolRegistry>,
    resolver: Arc<GroupResolver>,
    lifecycle: Arc<ConnectionManager>,
    adapter: Arc<ApiToolAdapter>,
    tracer: Arc<MessageTracer>,
    bus: EventBus,
}

impl HubService {
    pub fn new(
        registry: Arc<ToolRegistry>,
        resolver: Arc<GroupResolver>,
        lifecycle: Arc<ConnectionManager>,
        adapter: Arc<ApiToolAdapter>,
        tracer: Arc<MessageTracer>,
        bus: EventBus,
    ) -> Self {
        Self {
            registry,
            resolver,
            lifecycle,
            adapter,
            tracer,
            bus,
        }
    }

    /// Tools visible in `group_id` (default group when absent).
    pub fn list_tools(&self, group_id: Option<&str>) -> Vec<Tool> {
        self.resolver.visible_tools(group_id)
    }

    /// Invoke `tool_name` with `args` under `group_id`'s visibility.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        args: Value,
        group_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let group = group_id.unwrap_or(DEFAULT_GROUP_ID);
        let started = Instant::now();

        let result = self.route(tool_name, args, group, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let origin = self
            .registry
            .get(tool_name)
            .map(|t| {
                if t.origin.is_adapter() {
                    "adapter"
                } else {
                    "backend"
                }
            })
            .unwrap_or("unknown");
        self.bus.publish_invocation_event(InvocationEvent::Completed {
            tool_name: tool_name.to_string(),
            group_id: group.to_string(),
            origin: origin.to_string(),
            duration_ms,
            is_error: result.is_error,
        });
        metrics::counter!("hub_calls_total").increment(1);
        if result.is_error {
            metrics::counter!("hub_call_errors_total").increment(1);
        }

        result
    }

    async fn route(
        &self,
        tool_name: &str,
        args: Value,
        group: &str,
        cancel: &CancellationToken,
    ) -> ToolResult {
        if !self.resolver.can_call(Some(group), tool_name) {
            return ToolResult::from(HubError::new(
                ErrorCode::ToolNotFound,
                format!("tool {tool_name:?} is not visible in group {group:?}"),
            ));
        }

        // Visibility just passed, so the tool is present; a racing removal
        // reads as not-found.
        let Some(tool) = self.registry.get(tool_name) else {
            return ToolResult::from(HubError::new(
                ErrorCode::ToolNotFound,
                format!("tool {tool_name:?} disappeared from the registry"),
            ));
        };

        debug!(tool = %tool_name, group = %group, "routing tool call");
        let outcome = match &tool.origin {
            ToolOrigin::Backend { server_id } => {
                self.lifecycle
                    .dispatch(server_id, tool_name, args, cancel)
                    .await
            }
            ToolOrigin::Adapter { tool_id } => self.adapter.execute(tool_id, args, cancel).await,
        };

        match outcome {
            Ok(result) => result,
            Err(err) => ToolResult::from(err),
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let details = self.lifecycle.all();
        let connected = details
            .iter()
            .filter(|s| s.status.is_dispatchable())
            .count();
        Diagnostics {
            servers: ServerDiagnostics {
                total: details.len(),
                connected,
                details,
            },
            groups: GroupDiagnostics {
                count: self.resolver.group_count(),
            },
            tools: ToolDiagnostics {
                total: self.registry.len(),
            },
        }
    }

    pub fn traces(
        &self,
        server_id: Option<&str>,
        kind: Option<MessageKind>,
        limit: usize,
    ) -> Vec<MessageRecord> {
        self.tracer.query(server_id, kind, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::HubError;
    use crate::domain::group::Group;
    use crate::domain::server::{ServerConfig, TransportType};
    use crate::domain::transport::{BackendToolInfo, McpConnector, McpSession};
    use crate::infrastructure::http_executor::HttpExecutor;
    use crate::infrastructure::response_cache::ResponseCache;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    struct EchoSession {
        tools: Vec<BackendToolInfo>,
    }

    #[async_trait]
    impl McpSession for EchoSession {
        async fn list_tools(&self) -> Result<Vec<BackendToolInfo>, HubError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, HubError> {
            Ok(ToolResult::text(format!("{name}:{arguments}")))
        }

        async fn wait_closed(&self) {
            std::future::pending::<()>().await;
        }

        async fn close(&self) -> Result<(), HubError> {
            Ok(())
        }
    }

    struct EchoConnector {
        tools_by_server: HashMap<String, Vec<BackendToolInfo>>,
    }

    #[async_trait]
    impl McpConnector for EchoConnector {
        async fn connect(
            &self,
            config: &ServerConfig,
            _resolved_env: &HashMap<String, String>,
        ) -> Result<Box<dyn McpSession>, HubError> {
            Ok(Box::new(EchoSession {
                tools: self.tools_by_server.get(&config.id).cloned().unwrap_or_default(),
            }))
        }
    }

    fn config(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.into(),
            transport: TransportType::Stdio {
                command: "mock".into(),
                args: vec![],
                env: HashMap::new(),
            },
            enabled: true,
        }
    }

    fn backend_tool(name: &str) -> BackendToolInfo {
        BackendToolInfo {
            name: name.into(),
            description: None,
            input_schema: json!({"type": "object"}),
        }
    }

    async fn service_with(
        tools_by_server: HashMap<String, Vec<BackendToolInfo>>,
        groups: Vec<Group>,
    ) -> (HubService, Arc<ConnectionManager>) {
        let registry = Arc::new(ToolRegistry::new());
        let tracer = Arc::new(MessageTracer::default());
        let bus = EventBus::with_default_capacity();
        let server_ids: Vec<String> = tools_by_server.keys().cloned().collect();

        let manager = ConnectionManager::new(
            Arc::new(EchoConnector { tools_by_server }),
            Arc::clone(&registry),
            Arc::clone(&tracer),
            bus.clone(),
        );
        manager.add_servers(server_ids.iter().map(|id| config(id)).collect());
        manager.initialize().await;

        let resolver = Arc::new(GroupResolver::new(Arc::clone(&registry)));
        resolver.load(groups);

        let adapter = Arc::new(ApiToolAdapter::new(
            Arc::new(HttpExecutor::new().unwrap()),
            Arc::new(ResponseCache::new(10)),
            HashMap::new(),
        ));

        let service = HubService::new(
            registry,
            resolver,
            Arc::clone(&manager),
            adapter,
            tracer,
            bus,
        );
        (service, manager)
    }

    fn group(id: &str, servers: &[&str]) -> Group {
        Group {
            id: id.into(),
            name: None,
            servers: servers.iter().map(|s| s.to_string()).collect(),
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_group_filtering_scenario() {
        let (service, manager) = service_with(
            HashMap::from([
                ("srv1".to_string(), vec![backend_tool("toolA")]),
                ("srv2".to_string(), vec![backend_tool("toolB")]),
            ]),
            vec![group("g", &["srv1"])],
        )
        .await;

        let visible = service.list_tools(Some("g"));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "toolA");

        let result = service
            .call_tool("toolB", json!({}), Some("g"), &CancellationToken::new())
            .await;
        assert!(result.is_error);
        assert!(result.joined_text().starts_with("Runtime: tool-not-found"));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_backend_routing() {
        let (service, manager) = service_with(
            HashMap::from([("srv1".to_string(), vec![backend_tool("toolA")])]),
            vec![group(DEFAULT_GROUP_ID, &["srv1"])],
        )
        .await;

        let result = service
            .call_tool("toolA", json!({"k": 1}), None, &CancellationToken::new())
            .await;
        assert!(!result.is_error);
        assert!(result.joined_text().starts_with("toolA:"));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_group_rejects_calls() {
        let (service, manager) = service_with(
            HashMap::from([("srv1".to_string(), vec![backend_tool("toolA")])]),
            vec![group(DEFAULT_GROUP_ID, &["srv1"])],
        )
        .await;

        assert!(service.list_tools(Some("ghost")).is_empty());
        let result = service
            .call_tool("toolA", json!({}), Some("ghost"), &CancellationToken::new())
            .await;
        assert!(result.is_error);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_diagnostics_aggregation() {
        let (service, manager) = service_with(
            HashMap::from([
                ("srv1".to_string(), vec![backend_tool("toolA")]),
                ("srv2".to_string(), vec![backend_tool("toolB")]),
            ]),
            vec![group(DEFAULT_GROUP_ID, &["srv1", "srv2"]), group("g", &["srv1"])],
        )
        .await;

        let diag = service.diagnostics();
        assert_eq!(diag.servers.total, 2);
        assert_eq!(diag.servers.connected, 2);
        assert_eq!(diag.groups.count, 2);
        assert_eq!(diag.tools.total, 2);

        manager.shutdown().await;
        let diag = service.diagnostics();
        assert_eq!(diag.servers.connected, 0);
    }

    #[tokio::test]
    async fn test_traces_pass_through() {
        let (service, manager) = service_with(
            HashMap::from([("srv1".to_string(), vec![backend_tool("toolA")])]),
            vec![group(DEFAULT_GROUP_ID, &["srv1"])],
        )
        .await;

        service
            .call_tool("toolA", json!({}), None, &CancellationToken::new())
            .await;

        let calls = service.traces(Some("srv1"), Some(MessageKind::Request), 0);
        assert!(calls.iter().any(|r| r.method == "tools/call"));
        manager.shutdown().await;
    }
}
