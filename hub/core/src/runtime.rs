// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Construction Root
//!
//! [`HubRuntime`] wires the hub together (event bus, registry, tracer,
//! connection manager, cache, adapter, hub service) and owns explicit
//! `init` / `shutdown`. Nothing here is a global: callers hold the runtime
//! and pass references down, which keeps tests able to build as many
//! isolated hubs as they like.

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::adapter::ApiToolAdapter;
use crate::application::group_resolver::GroupResolver;
use crate::application::hub_service::HubService;
use crate::domain::error::HubError;
use crate::domain::server::InitSummary;
use crate::domain::transport::McpConnector;
use crate::infrastructure::config_loader::HubConfig;
use crate::infrastructure::connection_manager::ConnectionManager;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::http_executor::HttpExecutor;
use crate::infrastructure::mcp_client::RmcpConnector;
use crate::infrastructure::registry::{EventBusForwarder, ToolRegistry};
use crate::infrastructure::response_cache::{ResponseCache, DEFAULT_SWEEP_INTERVAL};
use crate::infrastructure::tracer::MessageTracer;

pub struct HubRuntime {
    pub bus: EventBus,
    pub registry: Arc<ToolRegistry>,
    pub tracer: Arc<MessageTracer>,
    pub lifecycle: Arc<ConnectionManager>,
    pub resolver: Arc<GroupResolver>,
    pub cache: Arc<ResponseCache>,
    pub adapter: Arc<ApiToolAdapter>,
    pub hub: Arc<HubService>,
    sweeper_cancel: CancellationToken,
}

impl HubRuntime {
    /// Wire a runtime against the real `rmcp` transports.
    pub fn build(config: &HubConfig) -> Result<Self, HubError> {
        let tracer = Arc::new(MessageTracer::default());
        let connector: Arc<dyn McpConnector> =
            Arc::new(RmcpConnector::new(Arc::clone(&tracer)));
        Self::build_with_connector(config, connector, tracer)
    }

    /// Wire a runtime around any connector. Tests hand in scripted ones.
    pub fn build_with_connector(
        config: &HubConfig,
        connector: Arc<dyn McpConnector>,
        tracer: Arc<MessageTracer>,
    ) -> Result<Self, HubError> {
        let bus = EventBus::with_default_capacity();

        let registry = Arc::new(ToolRegistry::new());
        registry.subscribe(Arc::new(EventBusForwarder::new(bus.clone())));

        let lifecycle = ConnectionManager::new(
            connector,
            Arc::clone(&registry),
            Arc::clone(&tracer),
            bus.clone(),
        );

        let resolver = Arc::new(GroupResolver::new(Arc::clone(&registry)));

        // One shared response cache sized to the largest per-tool request.
        let cache_size = config
            .api_tools
            .tools
            .iter()
            .filter_map(|t| t.cache.as_ref().map(|c| c.max_size))
            .max()
            .unwrap_or(crate::domain::api_tool::DEFAULT_CACHE_MAX_SIZE);
        let cache = Arc::new(ResponseCache::new(cache_size));

        let http = Arc::new(HttpExecutor::new()?);
        let adapter = Arc::new(ApiToolAdapter::with_process_env(http, Arc::clone(&cache)));

        let hub = Arc::new(HubService::new(
            Arc::clone(&registry),
            Arc::clone(&resolver),
            Arc::clone(&lifecycle),
            Arc::clone(&adapter),
            Arc::clone(&tracer),
            bus.clone(),
        ));

        Ok(Self {
            bus,
            registry,
            tracer,
            lifecycle,
            resolver,
            cache,
            adapter,
            hub,
            sweeper_cancel: CancellationToken::new(),
        })
    }

    /// Apply the config snapshot and start all enabled servers. Returns the
    /// startup summary and the accumulated loader warnings.
    pub async fn init(&self, config: &HubConfig) -> (InitSummary, Vec<String>) {
        let mut warnings = config.warnings.clone();

        warnings.extend(self.adapter.load(&config.api_tools, &self.registry));
        self.resolver.load(config.groups.clone());

        self.lifecycle.add_servers(config.servers.clone());
        let summary = self.lifecycle.initialize().await;

        let known: HashSet<String> = config.servers.iter().map(|s| s.id.clone()).collect();
        warnings.extend(self.resolver.validate_references(&known));

        let _sweeper = self
            .cache
            .spawn_sweeper(DEFAULT_SWEEP_INTERVAL, self.sweeper_cancel.clone());

        info!(
            connected = summary.connected,
            failed = summary.failed,
            tools = self.registry.len(),
            groups = self.resolver.group_count(),
            "hub initialized"
        );
        (summary, warnings)
    }

    /// Swap groups and adapter tools from a fresh snapshot and dial any
    /// newly added servers. Existing connections are never torn down by a
    /// reload; removing a server takes a restart.
    pub async fn reload(&self, config: &HubConfig) -> Vec<String> {
        let mut warnings = config.warnings.clone();
        warnings.extend(self.adapter.load(&config.api_tools, &self.registry));
        self.resolver.load(config.groups.clone());
        self.lifecycle.add_servers(config.servers.clone());
        let summary = self.lifecycle.initialize().await;
        if summary.failed > 0 {
            for (id, err) in &summary.errors {
                warnings.push(format!("server {id:?} failed to start on reload: {err}"));
            }
        }
        let known: HashSet<String> = config.servers.iter().map(|s| s.id.clone()).collect();
        warnings.extend(self.resolver.validate_references(&known));
        warnings
    }

    /// Stop supervisors, close every connection, stop the cache sweeper.
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.sweeper_cancel.cancel();
        self.lifecycle.shutdown().await;
        info!("hub runtime shut down");
    }
}
