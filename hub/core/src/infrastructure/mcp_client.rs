// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # rmcp-backed Transport Client
//!
//! Production [`McpConnector`] implementation over the `rmcp` client
//! transports: child process (stdio), SSE, and streamable HTTP. One
//! [`McpSession`] wraps a running `rmcp` service: the peer handle serves
//! RPCs, a watch channel flips when the service's drive loop ends so the
//! supervisor can observe transport closure.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo};
use rmcp::service::{RunningService, RunningServiceCancellationToken};
use rmcp::transport::sse_client::SseClientConfig;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{
    ConfigureCommandExt, SseClientTransport, StreamableHttpClientTransport, TokioChildProcess,
};
use rmcp::{ClientHandler, Peer, RoleClient};

use crate::domain::error::{ErrorCode, HubError};
use crate::domain::server::{ServerConfig, TransportType};
use crate::domain::tool::{ContentBlock, ToolResult};
use crate::domain::transport::{BackendToolInfo, McpConnector, McpSession};
use crate::infrastructure::tracer::MessageTracer;

/// Client handler reported to backends during the MCP handshake. Logging
/// and tool-list-changed notifications are traced, nothing else is
/// intercepted.
#[derive(Clone)]
pub struct HubClientHandler {
    client_info: ClientInfo,
    server_id: String,
    tracer: Arc<MessageTracer>,
}

impl HubClientHandler {
    fn new(server_id: &str, tracer: Arc<MessageTracer>) -> Self {
        let mut info = ClientInfo::default();
        info.client_info.name = "mcp-hub".into();
        info.client_info.version = env!("CARGO_PKG_VERSION").into();
        Self {
            client_info: info,
            server_id: server_id.to_string(),
            tracer,
        }
    }
}

impl ClientHandler for HubClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.client_info.clone()
    }

    fn on_logging_message(
        &self,
        params: rmcp::model::LoggingMessageNotificationParam,
        _context: rmcp::service::NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        async move {
            debug!(server = %self.server_id, level = ?params.level, "backend log message");
            self.tracer.record_notification(
                &self.server_id,
                "notifications/message",
                serde_json::to_value(&params.data).unwrap_or(Value::Null),
            );
        }
    }

    fn on_tool_list_changed(
        &self,
        _context: rmcp::service::NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        async move {
            info!(server = %self.server_id, "backend reported a changed tool list");
            self.tracer.record_notification(
                &self.server_id,
                "notifications/tools/list_changed",
                Value::Null,
            );
        }
    }
}

struct RmcpSession {
    peer: Peer<RoleClient>,
    cancel: std::sync::Mutex<Option<RunningServiceCancellationToken>>,
    closed_rx: watch::Receiver<bool>,
}

impl RmcpSession {
    fn new(service: RunningService<RoleClient, HubClientHandler>) -> Self {
        let peer = service.peer().clone();
        let cancel = service.cancellation_token();
        let (closed_tx, closed_rx) = watch::channel(false);
        tokio::spawn(async move {
            // Resolves when the transport closes, the backend exits, or the
            // session is cancelled.
            let _ = service.waiting().await;
            let _ = closed_tx.send(true);
        });
        Self {
            peer,
            cancel: std::sync::Mutex::new(Some(cancel)),
            closed_rx,
        }
    }
}

#[async_trait]
impl McpSession for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<BackendToolInfo>, HubError> {
        let tools = self.peer.list_all_tools().await.map_err(|e| {
            HubError::new(
                ErrorCode::ToolExecutionFailed,
                format!("tools/list failed: {e}"),
            )
        })?;
        Ok(tools
            .into_iter()
            .map(|tool| BackendToolInfo {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: Value::Object(tool.input_schema.as_ref().clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, HubError> {
        let mut params = CallToolRequestParams::new(name.to_string());
        if let Some(arguments) = arguments.as_object().cloned() {
            params = params.with_arguments(arguments);
        }
        let result = self.peer.call_tool(params).await.map_err(|e| {
            HubError::new(
                ErrorCode::ToolExecutionFailed,
                format!("tools/call {name:?} failed: {e}"),
            )
        })?;
        Ok(convert_result(result))
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
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            cancel.cancel();
        }
        Ok(())
    }
}

fn convert_result(result: CallToolResult) -> ToolResult {
    let content = result
        .content
        .iter()
        .map(|item| match item.as_text() {
            Some(text) => ContentBlock::text(text.text.clone()),
            None => ContentBlock::Other(serde_json::to_value(item).unwrap_or(Value::Null)),
        })
        .collect();
    ToolResult {
        content,
        is_error: result.is_error.unwrap_or(false),
    }
}

/// Connector that dials real backends via `rmcp`.
pub struct RmcpConnector {
    tracer: Arc<MessageTracer>,
}

impl RmcpConnector {
    pub fn new(tracer: Arc<MessageTracer>) -> Self {
        Self { tracer }
    }

    fn startup_error(config: &ServerConfig, detail: impl std::fmt::Display) -> HubError {
        HubError::new(
            ErrorCode::ServerStartupFailed,
            format!(
                "failed to start {} server {:?}: {detail}",
                config.transport.kind(),
                config.id
            ),
        )
    }
}

#[async_trait]
impl McpConnector for RmcpConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
        resolved_env: &HashMap<String, String>,
    ) -> Result<Box<dyn McpSession>, HubError> {
        let handler = HubClientHandler::new(&config.id, Arc::clone(&self.tracer));

        let service = match &config.transport {
            TransportType::Stdio { command, args, .. } => {
                let transport = TokioChildProcess::new(
                    tokio::process::Command::new(command).configure(|cmd| {
                        cmd.args(args)
                            .env_clear()
                            .envs(resolved_env)
                            .stderr(std::process::Stdio::null());
                    }),
                )
                .map_err(|e| Self::startup_error(config, e))?;

                rmcp::serve_client(handler, transport)
                    .await
                    .map_err(|e| Self::startup_error(config, e))?
            }

            TransportType::Sse { url, headers } => {
                let client = http_client_with_headers(headers)
                    .map_err(|e| Self::startup_error(config, e))?;
                let sse_config = SseClientConfig {
                    sse_endpoint: url.clone().into(),
                    ..Default::default()
                };
                let transport = SseClientTransport::start_with_client(client, sse_config)
                    .await
                    .map_err(|e| Self::startup_error(config, e))?;

                rmcp::serve_client(handler, transport)
                    .await
                    .map_err(|e| Self::startup_error(config, e))?
            }

            TransportType::StreamableHttp { url, headers } => {
                let http_config = StreamableHttpClientTransportConfig::with_uri(url.as_str());
                let transport = if headers.is_empty() {
                    StreamableHttpClientTransport::from_config(http_config)
                } else {
                    let client = http_client_with_headers(headers)
                        .map_err(|e| Self::startup_error(config, e))?;
                    StreamableHttpClientTransport::with_client(client, http_config)
                };

                rmcp::serve_client(handler, transport)
                    .await
                    .map_err(|e| Self::startup_error(config, e))?
            }
        };

        info!(server = %config.id, transport = config.transport.kind(), "backend connected");
        Ok(Box::new(RmcpSession::new(service)))
    }
}

fn http_client_with_headers(
    headers: &HashMap<String, String>,
) -> Result<reqwest::Client, String> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        let name: reqwest::header::HeaderName = name
            .parse()
            .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
        let value: reqwest::header::HeaderValue = value
            .parse()
            .map_err(|e| format!("invalid header value for {name:?}: {e}"))?;
        header_map.insert(name, value);
    }
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .default_headers(header_map)
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_construction() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer tok".to_string());
        assert!(http_client_with_headers(&headers).is_ok());

        let mut bad = HashMap::new();
        bad.insert("bad header name".to_string(), "v".to_string());
        assert!(http_client_with_headers(&bad).is_err());
    }
}
