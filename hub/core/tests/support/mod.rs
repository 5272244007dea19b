// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! Scripted transport doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use mcp_hub_core::domain::error::{ErrorCode, HubError};
use mcp_hub_core::domain::server::{ServerConfig, TransportType};
use mcp_hub_core::domain::tool::ToolResult;
use mcp_hub_core::domain::transport::{BackendToolInfo, McpConnector, McpSession};

pub struct ScriptedSession {
    server_id: String,
    tools: Vec<BackendToolInfo>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

#[async_trait]
impl McpSession for ScriptedSession {
    async fn list_tools(&self) -> Result<Vec<BackendToolInfo>, HubError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, HubError> {
        Ok(ToolResult::text(format!(
            "{}:{}:{}",
            self.server_id, name, arguments
        )))
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

/// Connector whose sessions can be killed on demand and which can be
/// scripted to refuse the first N connection attempts.
pub struct ScriptedConnector {
    tools_by_server: HashMap<String, Vec<BackendToolInfo>>,
    fail_first: u32,
    attempts: AtomicU32,
    close_handles: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl ScriptedConnector {
    pub fn new(tools_by_server: HashMap<String, Vec<BackendToolInfo>>) -> Self {
        Self {
            tools_by_server,
            fail_first: 0,
            attempts: AtomicU32::new(0),
            close_handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing_first(mut self, failures: u32) -> Self {
        self.fail_first = failures;
        self
    }

    /// Simulate the backend process exiting.
    pub fn kill_session(&self, server_id: &str) {
        if let Some(tx) = self.close_handles.lock().get(server_id) {
            let _ = tx.send(true);
        }
    }

    pub fn connect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpConnector for ScriptedConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
        _resolved_env: &HashMap<String, String>,
    ) -> Result<Box<dyn McpSession>, HubError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(HubError::new(
                ErrorCode::ConnectionRefused,
                format!("scripted connect failure {attempt}"),
            ));
        }
        let tools = self
            .tools_by_server
            .get(&config.id)
            .cloned()
            .ok_or_else(|| {
                HubError::new(ErrorCode::ConnectionRefused, "no such scripted backend")
            })?;
        let (closed_tx, closed_rx) = watch::channel(false);
        self.close_handles
            .lock()
            .insert(config.id.clone(), closed_tx.clone());
        Ok(Box::new(ScriptedSession {
            server_id: config.id.clone(),
            tools,
            closed_tx,
            closed_rx,
        }))
    }
}

pub fn stdio_server(id: &str) -> ServerConfig {
    ServerConfig {
        id: id.to_string(),
        transport: TransportType::Stdio {
            command: "scripted-backend".into(),
            args: vec![],
            env: HashMap::new(),
        },
        enabled: true,
    }
}

pub fn backend_tool(name: &str) -> BackendToolInfo {
    BackendToolInfo {
        name: name.to_string(),
        description: Some(format!("{name} test tool")),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

/// Minimal scripted HTTP origin: 503 for the first `failures` requests,
/// then 200 with `body`. Gives tests deterministic response sequencing for
/// identical retried requests.
pub async fn flaky_origin(
    failures: usize,
    body: &'static str,
) -> (String, Arc<std::sync::atomic::AtomicUsize>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let served_in_task = Arc::clone(&served);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let n = served_in_task.fetch_add(1, Ordering::SeqCst);
            let response = if n < failures {
                "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    .to_string()
            } else {
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
            };
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    (format!("http://{addr}"), served)
}
