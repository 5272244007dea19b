// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Server Lifecycle Manager
//!
//! Owns one connection per enabled [`ServerConfig`]. Startup is concurrent:
//! every enabled backend is dialed in its own task and a failure never
//! aborts its peers. Each live connection gets a supervisor task that
//! observes transport closure and re-enters the reconnect loop (capped
//! exponential backoff, unbounded attempts, cancelled on shutdown).
//!
//! Discovered tools are registered in the [`ToolRegistry`] under origin
//! `backend:<id>`; on teardown the server's tools are unregistered *before*
//! the session is dropped, so a tool name never outlives its source. When
//! two backends report the same tool name, the lexicographically smaller
//! server id wins, deterministically.
//!
//! Every RPC issued here is traced before send and after completion with
//! its wall time; trace recording never fails the RPC.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::error::{ErrorCode, HubError};
use crate::domain::events::ServerEvent;
use crate::domain::server::{InitSummary, ServerConfig, ServerSnapshot, ServerStatus};
use crate::domain::tool::{Tool, ToolOrigin, ToolResult};
use crate::domain::transport::{BackendToolInfo, McpConnector, McpSession};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::registry::ToolRegistry;
use crate::infrastructure::retry::RetryPolicy;
use crate::infrastructure::tracer::MessageTracer;

/// Deadline for dialing a backend and completing the handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for the post-connect `tools/list` discovery call.
const LIST_TOOLS_TIMEOUT: Duration = Duration::from_secs(10);

struct ConnectionState {
    config: ServerConfig,
    status: ServerStatus,
    session: Option<Arc<dyn McpSession>>,
    last_connected_at: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    reconnect_attempts: u32,
    /// Last reported tool list. Kept after disconnect for staleness
    /// inspection; dispatchability is governed by `status` alone.
    cached_tools: Vec<BackendToolInfo>,
}

impl ConnectionState {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            status: ServerStatus::Disconnected,
            session: None,
            last_connected_at: None,
            last_error: None,
            reconnect_attempts: 0,
            cached_tools: Vec::new(),
        }
    }

    fn snapshot(&self, id: &str) -> ServerSnapshot {
        ServerSnapshot {
            id: id.to_string(),
            transport: self.config.transport.kind().to_string(),
            status: self.status,
            last_connected_at: self.last_connected_at,
            last_error: self.last_error.clone(),
            reconnect_attempts: self.reconnect_attempts,
            tool_count: self.cached_tools.len(),
        }
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn McpConnector>,
    registry: Arc<ToolRegistry>,
    tracer: Arc<MessageTracer>,
    bus: EventBus,
    connections: RwLock<HashMap<String, ConnectionState>>,
    /// Process environment snapshot merged under each stdio config's env.
    base_env: HashMap<String, String>,
    shutdown: CancellationToken,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn McpConnector>,
        registry: Arc<ToolRegistry>,
        tracer: Arc<MessageTracer>,
        bus: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector,
            registry,
            tracer,
            bus,
            connections: RwLock::new(HashMap::new()),
            base_env: std::env::vars().collect(),
            shutdown: CancellationToken::new(),
            supervisors: Mutex::new(Vec::new()),
        })
    }

    /// Register configs. Disabled servers are skipped with a log line.
    pub fn add_servers(&self, configs: Vec<ServerConfig>) {
        let mut connections = self.connections.write();
        for config in configs {
            if !config.enabled {
                debug!(server = %config.id, "server disabled in config, skipping");
                continue;
            }
            connections
                .entry(config.id.clone())
                .or_insert_with(|| ConnectionState::new(config));
        }
    }

    /// Start every registered server concurrently. Failures are reported in
    /// the summary and handed to the reconnect loop; peers are unaffected.
    /// Servers that are already live (or already reconnecting) are left
    /// alone, so a config reload only dials the additions.
    pub async fn initialize(self: &Arc<Self>) -> InitSummary {
        let ids: Vec<String> = self
            .connections
            .read()
            .iter()
            .filter(|(_, state)| state.status == ServerStatus::Disconnected)
            .map(|(id, _)| id.clone())
            .collect();
        let mut join_set = JoinSet::new();
        for id in ids {
            let manager = Arc::clone(self);
            join_set.spawn(async move {
                let result = manager.connect_one(&id).await;
                (id, result)
            });
        }

        let mut summary = InitSummary::default();
        while let Some(joined) = join_set.join_next().await {
            let Ok((id, result)) = joined else { continue };
            match result {
                Ok(()) => summary.connected += 1,
                Err(err) => {
                    warn!(server = %id, error = %err, "server failed to start");
                    summary.failed += 1;
                    summary.errors.insert(id.clone(), err.to_string());
                    self.spawn_reconnect(id);
                }
            }
        }

        info!(
            connected = summary.connected,
            failed = summary.failed,
            "server initialization complete"
        );
        summary
    }

    /// Connect protocol for one server: `Connecting` → dial with the merged
    /// environment → `Connected` → discover and register tools. On any
    /// failure the state moves to `Error` with `last_error` set and the
    /// attempt counter bumped; scheduling the retry is the caller's job.
    async fn connect_one(self: &Arc<Self>, id: &str) -> Result<(), HubError> {
        let config = {
            let mut connections = self.connections.write();
            let state = connections.get_mut(id).ok_or_else(|| {
                HubError::new(
                    ErrorCode::InvalidServerConfig,
                    format!("unknown server {id:?}"),
                )
            })?;
            state.status = ServerStatus::Connecting;
            state.config.clone()
        };
        self.emit_status(id, ServerStatus::Connecting);

        let resolved_env = self.merged_env(&config);
        let connect = self.connector.connect(&config, &resolved_env);
        let session: Arc<dyn McpSession> =
            match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
                Ok(Ok(session)) => Arc::from(session),
                Ok(Err(err)) => return Err(self.record_failure(id, err)),
                Err(_) => {
                    let err = HubError::new(
                        ErrorCode::ConnectionTimeout,
                        format!("handshake with {id:?} exceeded {CONNECT_TIMEOUT:?}"),
                    );
                    return Err(self.record_failure(id, err));
                }
            };

        // Discovery failure counts as a failed connect: a server we cannot
        // enumerate is not usable.
        self.tracer.record_request(id, "tools/list", json!({}));
        let started = Instant::now();
        let discovery =
            tokio::time::timeout(LIST_TOOLS_TIMEOUT, session.list_tools()).await;
        let tools = match discovery {
            Ok(Ok(tools)) => tools,
            Ok(Err(err)) => {
                let _ = session.close().await;
                return Err(self.record_failure(id, err));
            }
            Err(_) => {
                let _ = session.close().await;
                let err = HubError::new(
                    ErrorCode::ConnectionTimeout,
                    format!("tools/list on {id:?} exceeded {LIST_TOOLS_TIMEOUT:?}"),
                );
                return Err(self.record_failure(id, err));
            }
        };
        self.tracer.record_response(
            id,
            "tools/list",
            json!({"count": tools.len()}),
            started.elapsed().as_millis() as u64,
        );

        {
            let mut connections = self.connections.write();
            if let Some(state) = connections.get_mut(id) {
                state.status = ServerStatus::Connected;
                state.session = Some(Arc::clone(&session));
                state.last_connected_at = Some(Utc::now());
                state.last_error = None;
                state.reconnect_attempts = 0;
                state.cached_tools = tools.clone();
            }
        }
        self.emit_status(id, ServerStatus::Connected);
        self.register_discovered(id, &tools);
        self.bus.publish_server_event(ServerEvent::ToolsDiscovered {
            server_id: id.to_string(),
            count: tools.len(),
        });
        metrics::gauge!("hub_servers_connected").increment(1.0);

        self.spawn_supervisor(id.to_string(), session);
        Ok(())
    }

    fn merged_env(&self, config: &ServerConfig) -> HashMap<String, String> {
        let mut env = self.base_env.clone();
        if let crate::domain::server::TransportType::Stdio { env: overrides, .. } =
            &config.transport
        {
            // Config wins over the inherited process environment.
            for (key, value) in overrides {
                env.insert(key.clone(), value.clone());
            }
        }
        env
    }

    fn record_failure(&self, id: &str, err: HubError) -> HubError {
        {
            let mut connections = self.connections.write();
            if let Some(state) = connections.get_mut(id) {
                state.status = ServerStatus::Error;
                state.session = None;
                state.last_error = Some(err.to_string());
                state.reconnect_attempts = state.reconnect_attempts.saturating_add(1);
            }
        }
        self.emit_status(id, ServerStatus::Error);
        err
    }

    fn emit_status(&self, id: &str, status: ServerStatus) {
        self.bus.publish_server_event(ServerEvent::StatusChanged {
            server_id: id.to_string(),
            status,
            at: Utc::now(),
        });
    }

    /// Register tools reported by `server_id`, resolving cross-server name
    /// collisions by lexicographic server-id order.
    fn register_discovered(&self, server_id: &str, tools: &[BackendToolInfo]) {
        for info in tools {
            if let Some(existing) = self.registry.get(&info.name) {
                let existing_source = existing.origin.source_id();
                if existing_source != server_id && existing_source < server_id {
                    warn!(
                        tool = %info.name,
                        kept = %existing_source,
                        skipped = %server_id,
                        "duplicate tool name, keeping lexicographically first server"
                    );
                    continue;
                }
            }
            let tool = Tool {
                name: info.name.clone(),
                description: info.description.clone().unwrap_or_default(),
                input_schema: info.input_schema.clone(),
                origin: ToolOrigin::Backend {
                    server_id: server_id.to_string(),
                },
            };
            if let Err(err) = self.registry.register(tool) {
                warn!(server = %server_id, tool = %info.name, error = %err, "tool rejected by registry");
            }
        }
    }

    fn spawn_supervisor(self: &Arc<Self>, id: String, session: Arc<dyn McpSession>) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = manager.shutdown.cancelled() => return,
                _ = session.wait_closed() => {}
            }
            if manager.shutdown.is_cancelled() {
                return;
            }
            warn!(server = %id, "transport closed unexpectedly");
            metrics::gauge!("hub_servers_connected").decrement(1.0);
            manager.mark_unavailable(&id, "transport closed");
            manager.reconnect_loop(id).await;
        });
        self.supervisors.lock().push(handle);
    }

    fn spawn_reconnect(self: &Arc<Self>, id: String) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            manager.reconnect_loop(id).await;
        });
        self.supervisors.lock().push(handle);
    }

    /// Backoff 1 s base, ×2, capped at 10 s, forever while the server stays
    /// registered. Exits on shutdown or once a connect succeeds (which
    /// spawns a fresh supervisor).
    async fn reconnect_loop(self: Arc<Self>, id: String) {
        let policy = RetryPolicy::unbounded();
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            let attempt = self
                .connections
                .read()
                .get(&id)
                .map(|s| s.reconnect_attempts)
                .unwrap_or(0);
            let delay = policy.delay_for(attempt.saturating_sub(1));
            self.bus
                .publish_server_event(ServerEvent::ReconnectScheduled {
                    server_id: id.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                });
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match self.connect_one(&id).await {
                Ok(()) => {
                    info!(server = %id, "reconnected");
                    return;
                }
                Err(err) => {
                    debug!(server = %id, error = %err, "reconnect attempt failed");
                }
            }
        }
    }

    /// Mark a server unusable after a transport loss. Dispatchability is
    /// gone (status gates it); the registered tools and the cached list
    /// stay, so callers see `server-unavailable` rather than a vanished
    /// tool during the outage.
    fn mark_unavailable(&self, id: &str, reason: &str) {
        let mut connections = self.connections.write();
        if let Some(state) = connections.get_mut(id) {
            state.status = ServerStatus::Error;
            state.session = None;
            state.last_error = Some(reason.to_string());
        }
        drop(connections);
        self.emit_status(id, ServerStatus::Error);
    }

    /// Close every connection concurrently. Per-close failures are logged
    /// and ignored. Idempotent: repeated calls are no-ops.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let sessions: Vec<(String, Arc<dyn McpSession>)> = {
            let mut connections = self.connections.write();
            connections
                .iter_mut()
                .filter_map(|(id, state)| {
                    state.status = ServerStatus::Disconnected;
                    state.session.take().map(|s| (id.clone(), s))
                })
                .collect()
        };

        for (id, _) in &sessions {
            self.registry.unregister_source(id);
        }

        let closes = sessions.into_iter().map(|(id, session)| async move {
            if let Err(err) = session.close().await {
                warn!(server = %id, error = %err, "close failed during shutdown");
            }
        });
        futures::future::join_all(closes).await;

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.supervisors.lock());
        for handle in handles {
            handle.abort();
        }
        info!("connection manager shut down");
    }

    pub fn status(&self, id: &str) -> Option<ServerSnapshot> {
        self.connections.read().get(id).map(|s| s.snapshot(id))
    }

    pub fn all(&self) -> Vec<ServerSnapshot> {
        let mut snapshots: Vec<ServerSnapshot> = self
            .connections
            .read()
            .iter()
            .map(|(id, state)| state.snapshot(id))
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Cached tool list, possibly stale when the server is not connected.
    pub fn tools(&self, id: &str) -> Option<Vec<BackendToolInfo>> {
        self.connections
            .read()
            .get(id)
            .map(|s| s.cached_tools.clone())
    }

    /// Invoke `tool_name` on the owning connection. Requires `Connected`;
    /// anything else is `server-unavailable`.
    pub async fn dispatch(
        &self,
        id: &str,
        tool_name: &str,
        args: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, HubError> {
        let session = {
            let connections = self.connections.read();
            let state = connections.get(id).ok_or_else(|| {
                HubError::new(
                    ErrorCode::ServerUnavailable,
                    format!("server {id:?} is not configured"),
                )
            })?;
            if !state.status.is_dispatchable() {
                return Err(HubError::new(
                    ErrorCode::ServerUnavailable,
                    format!("server {id:?} is {}", state.status),
                ));
            }
            state.session.clone().ok_or_else(|| {
                HubError::new(
                    ErrorCode::ServerUnavailable,
                    format!("server {id:?} has no live session"),
                )
            })?
        };

        self.tracer.record_request(
            id,
            "tools/call",
            json!({"name": tool_name, "arguments": args}),
        );
        let started = Instant::now();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(HubError::new(
                ErrorCode::ConnectionTimeout,
                format!("call of {tool_name:?} on {id:?} was cancelled"),
            )),
            _ = self.shutdown.cancelled() => Err(HubError::new(
                ErrorCode::ServiceUnavailable,
                format!("hub is shutting down, {tool_name:?} was aborted"),
            )),
            result = session.call_tool(tool_name, args) => result,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => self.tracer.record_response(
                id,
                "tools/call",
                serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
                elapsed_ms,
            ),
            Err(err) => self.tracer.record_response(
                id,
                "tools/call",
                json!({"error": err.to_string()}),
                elapsed_ms,
            ),
        }
        metrics::histogram!("hub_dispatch_duration_ms").record(elapsed_ms as f64);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::watch;

    /// Scripted session: serves a fixed tool list, optionally closes on
    /// demand, echoes calls.
    struct MockSession {
        tools: Vec<BackendToolInfo>,
        closed_tx: watch::Sender<bool>,
        closed_rx: watch::Receiver<bool>,
        fail_calls: bool,
    }

    #[async_trait]
    impl McpSession for MockSession {
        async fn list_tools(&self) -> Result<Vec<BackendToolInfo>, HubError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<ToolResult, HubError> {
            if self.fail_calls {
                return Err(HubError::new(
                    ErrorCode::ToolExecutionFailed,
                    format!("backend rejected {name:?}"),
                ));
            }
            Ok(ToolResult::text(format!("ran {name}")))
        }

        async fn wait_closed(&self) {
            let mut rx = self.closed_rx.clone();
            if *rx.borrow() {
                return;
            }
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return;
                }
            }
        }

        async fn close(&self) -> Result<(), HubError> {
            let _ = self.closed_tx.send(true);
            Ok(())
        }
    }

    /// Connector scripted to fail N times per server before succeeding.
    struct MockConnector {
        fail_first: u32,
        attempts: AtomicU32,
        tools_by_server: HashMap<String, Vec<BackendToolInfo>>,
        fail_calls: bool,
        /// Close handle of the most recent session, per server.
        close_handles: Mutex<HashMap<String, watch::Sender<bool>>>,
    }

    impl MockConnector {
        fn new(tools_by_server: HashMap<String, Vec<BackendToolInfo>>) -> Self {
            Self {
                fail_first: 0,
                attempts: AtomicU32::new(0),
                tools_by_server,
                fail_calls: false,
                close_handles: Mutex::new(HashMap::new()),
            }
        }

        fn kill_session(&self, server_id: &str) {
            if let Some(tx) = self.close_handles.lock().get(server_id) {
                let _ = tx.send(true);
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl McpConnector for MockConnector {
        async fn connect(
            &self,
            config: &ServerConfig,
            _resolved_env: &HashMap<String, String>,
        ) -> Result<Box<dyn McpSession>, HubError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(HubError::new(
                    ErrorCode::ConnectionRefused,
                    format!("scripted failure {attempt}"),
                ));
            }
            let tools = self
                .tools_by_server
                .get(&config.id)
                .cloned()
                .ok_or_else(|| HubError::new(ErrorCode::ConnectionRefused, "no such backend"))?;
            let (closed_tx, closed_rx) = watch::channel(false);
            self.close_handles
                .lock()
                .insert(config.id.clone(), closed_tx.clone());
            Ok(Box::new(MockSession {
                tools,
                closed_tx,
                closed_rx,
                fail_calls: self.fail_calls,
            }))
        }
    }

    fn stdio_config(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            transport: crate::domain::server::TransportType::Stdio {
                command: "mock-server".into(),
                args: vec![],
                env: HashMap::new(),
            },
            enabled: true,
        }
    }

    fn tool_info(name: &str) -> BackendToolInfo {
        BackendToolInfo {
            name: name.to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        }
    }

    fn manager_with(
        connector: Arc<MockConnector>,
        configs: Vec<ServerConfig>,
    ) -> (Arc<ConnectionManager>, Arc<ToolRegistry>) {
        let registry = Arc::new(ToolRegistry::new());
        let tracer = Arc::new(MessageTracer::default());
        let manager = ConnectionManager::new(
            connector,
            Arc::clone(&registry),
            tracer,
            EventBus::with_default_capacity(),
        );
        manager.add_servers(configs);
        (manager, registry)
    }

    #[tokio::test]
    async fn test_initialize_connects_all_and_registers_tools() {
        let connector = Arc::new(MockConnector::new(HashMap::from([
            ("srv1".to_string(), vec![tool_info("toolA")]),
            ("srv2".to_string(), vec![tool_info("toolB")]),
        ])));
        let (manager, registry) =
            manager_with(connector, vec![stdio_config("srv1"), stdio_config("srv2")]);

        let summary = manager.initialize().await;
        assert_eq!(summary.connected, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            manager.status("srv1").unwrap().status,
            ServerStatus::Connected
        );
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_server_does_not_abort_peers() {
        let connector = Arc::new(MockConnector::new(HashMap::from([(
            "good".to_string(),
            vec![tool_info("toolA")],
        )])));
        let (manager, registry) =
            manager_with(connector, vec![stdio_config("good"), stdio_config("bad")]);

        let summary = manager.initialize().await;
        assert_eq!(summary.connected, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.errors.contains_key("bad"));

        // Peer invariant: the failure left `good` untouched.
        assert_eq!(
            manager.status("good").unwrap().status,
            ServerStatus::Connected
        );
        assert_eq!(manager.status("bad").unwrap().status, ServerStatus::Error);
        assert_eq!(registry.len(), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_requires_connected() {
        let connector = Arc::new(MockConnector::new(HashMap::from([(
            "srv1".to_string(),
            vec![tool_info("toolA")],
        )])));
        let (manager, _registry) = manager_with(connector, vec![stdio_config("srv1")]);

        // Not yet initialized: disconnected.
        let err = manager
            .dispatch("srv1", "toolA", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerUnavailable);
        assert!(err.to_string().starts_with("Connection: server-unavailable"));

        manager.initialize().await;
        let result = manager
            .dispatch("srv1", "toolA", json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.joined_text(), "ran toolA");
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_is_traced_both_directions() {
        let connector = Arc::new(MockConnector::new(HashMap::from([(
            "srv1".to_string(),
            vec![tool_info("toolA")],
        )])));
        let registry = Arc::new(ToolRegistry::new());
        let tracer = Arc::new(MessageTracer::default());
        let manager = ConnectionManager::new(
            connector,
            registry,
            Arc::clone(&tracer),
            EventBus::with_default_capacity(),
        );
        manager.add_servers(vec![stdio_config("srv1")]);
        manager.initialize().await;

        manager
            .dispatch("srv1", "toolA", json!({"x": 1}), &CancellationToken::new())
            .await
            .unwrap();

        let calls = tracer.query(Some("srv1"), None, 0);
        // tools/list request+response during connect, then tools/call pair
        assert!(calls.len() >= 4);
        let last_two = &calls[calls.len() - 2..];
        assert_eq!(last_two[0].method, "tools/call");
        assert_eq!(
            last_two[0].kind,
            crate::infrastructure::tracer::MessageKind::Request
        );
        assert_eq!(
            last_two[1].kind,
            crate::infrastructure::tracer::MessageKind::Response
        );
        assert!(last_two[1].duration_ms.is_some());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_backend_error_does_not_change_peer_status() {
        let mut connector = MockConnector::new(HashMap::from([
            ("srv1".to_string(), vec![tool_info("toolA")]),
            ("srv2".to_string(), vec![tool_info("toolB")]),
        ]));
        connector.fail_calls = true;
        let connector = Arc::new(connector);
        let (manager, _registry) =
            manager_with(connector, vec![stdio_config("srv1"), stdio_config("srv2")]);
        manager.initialize().await;

        let err = manager
            .dispatch("srv1", "toolA", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ToolExecutionFailed);

        assert_eq!(
            manager.status("srv1").unwrap().status,
            ServerStatus::Connected
        );
        assert_eq!(
            manager.status("srv2").unwrap().status,
            ServerStatus::Connected
        );
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_transport_close() {
        let connector = Arc::new(MockConnector::new(HashMap::from([(
            "srv1".to_string(),
            vec![tool_info("toolA")],
        )])));
        let (manager, registry) = manager_with(Arc::clone(&connector), vec![stdio_config("srv1")]);
        manager.initialize().await;
        assert_eq!(registry.len(), 1);

        // Kill the backend; the supervisor should tear down and reconnect.
        connector.kill_session("srv1");
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert_eq!(
            manager.status("srv1").unwrap().status,
            ServerStatus::Connected
        );
        assert_eq!(registry.len(), 1);
        assert!(connector.attempts() >= 2);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backs_off_until_backend_returns() {
        let connector = Arc::new(MockConnector {
            fail_first: 3,
            attempts: AtomicU32::new(0),
            tools_by_server: HashMap::from([("srv1".to_string(), vec![tool_info("toolA")])]),
            fail_calls: false,
            close_handles: Mutex::new(HashMap::new()),
        });
        let (manager, _registry) = manager_with(Arc::clone(&connector), vec![stdio_config("srv1")]);

        let summary = manager.initialize().await;
        assert_eq!(summary.failed, 1);

        // Backoff schedule 1s + 2s then success on the third retry.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            manager.status("srv1").unwrap().status,
            ServerStatus::Connected
        );
        assert_eq!(connector.attempts(), 4);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_everything_and_is_idempotent() {
        let connector = Arc::new(MockConnector::new(HashMap::from([
            ("srv1".to_string(), vec![tool_info("toolA")]),
            ("srv2".to_string(), vec![tool_info("toolB")]),
        ])));
        let (manager, registry) =
            manager_with(connector, vec![stdio_config("srv1"), stdio_config("srv2")]);
        manager.initialize().await;

        manager.shutdown().await;
        for snapshot in manager.all() {
            assert_eq!(snapshot.status, ServerStatus::Disconnected);
        }
        assert_eq!(registry.len(), 0);

        // Second call is a no-op.
        manager.shutdown().await;
        for snapshot in manager.all() {
            assert_eq!(snapshot.status, ServerStatus::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_duplicate_tool_names_resolve_lexicographically() {
        let connector = Arc::new(MockConnector::new(HashMap::from([
            ("zeta".to_string(), vec![tool_info("shared")]),
            ("alpha".to_string(), vec![tool_info("shared")]),
        ])));
        let (manager, registry) =
            manager_with(connector, vec![stdio_config("zeta"), stdio_config("alpha")]);
        manager.initialize().await;

        let tool = registry.get("shared").unwrap();
        assert_eq!(tool.origin.source_id(), "alpha");
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_cached_tools_survive_disconnect() {
        let connector = Arc::new(MockConnector::new(HashMap::from([(
            "srv1".to_string(),
            vec![tool_info("toolA")],
        )])));
        let (manager, registry) = manager_with(Arc::clone(&connector), vec![stdio_config("srv1")]);
        manager.initialize().await;
        manager.shutdown().await;

        // Dispatchability is gone, the stale list is not.
        assert_eq!(registry.len(), 0);
        assert_eq!(manager.tools("srv1").unwrap().len(), 1);
    }
}
