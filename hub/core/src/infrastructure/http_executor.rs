// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Adapter HTTP Executor
//!
//! Sends one rendered request with a deadline and the retry classification:
//! connect errors, read timeouts, HTTP 5xx and 429 are retriable; every
//! other status is handed back for response classification. The executor
//! owns the process-wide `reqwest` client and with it the per-host
//! connection pool, created once at runtime init and dropped at shutdown.

use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::api_tool::HttpMethod;
use crate::domain::error::{ErrorCode, HubError};
use crate::infrastructure::retry::{run_with_retry, RetryPolicy};

/// Fully rendered HTTP request: every template token already substituted,
/// authentication already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl RenderedRequest {
    /// Set a header, replacing any existing value (case-insensitive name
    /// match).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        for (existing, v) in &mut self.headers {
            if existing.eq_ignore_ascii_case(name) {
                *v = value;
                return;
            }
        }
        self.headers.push((name.to_string(), value));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Decoded upstream response. `body` is the parsed JSON, or a JSON string
/// wrapping the raw text when the upstream did not return JSON.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Result<Self, HubError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                HubError::new(
                    ErrorCode::Internal,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;
        Ok(Self { client })
    }

    /// Send with the adapter retry policy: up to `max_attempts` total tries,
    /// backoff 1 s ×2 capped at 10 s.
    pub async fn execute_with_retry(
        &self,
        request: &RenderedRequest,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<UpstreamResponse, HubError> {
        run_with_retry(&RetryPolicy::bounded(max_attempts), cancel, |attempt| {
            let request = request.clone();
            async move {
                if attempt > 0 {
                    metrics::counter!("hub_adapter_http_retries_total").increment(1);
                }
                self.execute_once(&request, cancel).await
            }
        })
        .await
    }

    /// One attempt. 5xx and 429 become retriable errors; any other status is
    /// a successful exchange as far as transport is concerned.
    pub async fn execute_once(
        &self,
        request: &RenderedRequest,
        cancel: &CancellationToken,
    ) -> Result<UpstreamResponse, HubError> {
        let method = match request.method {
            HttpMethod::GET => reqwest::Method::GET,
            HttpMethod::POST => reqwest::Method::POST,
            HttpMethod::PUT => reqwest::Method::PUT,
            HttpMethod::DELETE => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(HubError::new(
                    ErrorCode::ConnectionTimeout,
                    "request cancelled by caller",
                ));
            }
            result = builder.send() => result.map_err(classify_reqwest_error)?,
        };

        let status = response.status().as_u16();
        metrics::counter!("hub_adapter_http_requests_total").increment(1);
        metrics::histogram!("hub_adapter_http_duration_ms")
            .record(started.elapsed().as_millis() as f64);

        if response.status().is_server_error() || status == 429 {
            return Err(HubError::new(
                ErrorCode::UpstreamUnavailable,
                format!("upstream answered HTTP {status}"),
            ));
        }

        let text = response.text().await.map_err(classify_reqwest_error)?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        debug!(status, url = %request.url, "adapter HTTP exchange complete");

        Ok(UpstreamResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> HubError {
    if err.is_timeout() {
        HubError::new(ErrorCode::ConnectionTimeout, format!("request timed out: {err}"))
    } else if err.is_connect() {
        HubError::new(ErrorCode::ConnectionRefused, format!("connect failed: {err}"))
    } else if err.is_request() || err.is_body() || err.is_decode() {
        HubError::new(
            ErrorCode::ToolExecutionFailed,
            format!("request failed: {err}"),
        )
    } else {
        HubError::new(
            ErrorCode::NetworkUnreachable,
            format!("network failure: {err}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: &str) -> RenderedRequest {
        RenderedRequest {
            method: HttpMethod::GET,
            url: url.to_string(),
            headers: vec![],
            query: vec![],
            body: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut req = request("http://x");
        req.set_header("Authorization", "Bearer a");
        req.set_header("authorization", "Bearer b");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer b"));
    }

    #[tokio::test]
    async fn test_5xx_is_a_retriable_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/boom")
            .with_status(503)
            .create_async()
            .await;

        let executor = HttpExecutor::new().unwrap();
        let err = executor
            .execute_once(&request(&format!("{}/boom", server.url())), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamUnavailable);
        assert!(err.is_retriable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_4xx_is_returned_for_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body(r#"{"error":{"message":"not found"}}"#)
            .create_async()
            .await;

        let executor = HttpExecutor::new().unwrap();
        let response = executor
            .execute_once(
                &request(&format!("{}/missing", server.url())),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body["error"]["message"], json!("not found"));
    }

    /// Minimal scripted origin: answers 503 for the first `failures`
    /// requests, then 200 with `body`. Deterministic request sequencing,
    /// which mock libraries cannot promise for identical requests.
    async fn flaky_origin(
        failures: usize,
        body: &'static str,
    ) -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let served_in_task = served.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let n = served_in_task.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
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

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_503() {
        let (url, served) = flaky_origin(2, r#"{"ok":true}"#).await;

        let executor = HttpExecutor::new().unwrap();
        let cancel = CancellationToken::new();
        let request = request(&format!("{url}/flaky"));

        // Backoff delays of 1 s + 2 s are acceptable for this
        // integration-style test.
        let response = executor
            .execute_with_retry(&request, 4, &cancel)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(served.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_json_body_wraps_as_string() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/text")
            .with_status(200)
            .with_body("plain text")
            .create_async()
            .await;

        let executor = HttpExecutor::new().unwrap();
        let response = executor
            .execute_once(
                &request(&format!("{}/text", server.url())),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.body, Value::String("plain text".into()));
    }
}
