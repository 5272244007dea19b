// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # API Tool Configuration
//!
//! Declarative input of the API-to-MCP adapter, parsed from
//! `api-tools.json`. One [`ApiToolConfig`] turns a JSON-body REST endpoint
//! into a synthetic tool: parameters are validated against `parameters`,
//! the request is rendered from `api` templates, and the response is
//! classified and transformed per `response`.
//!
//! Keys follow the document's camelCase convention. Defaults: request
//! timeout 30 s, 3 retries, cache TTL 300 s, cache capacity 1000.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_SIZE: usize = 1000;
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Top-level `api-tools.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToolsDoc {
    pub version: String,
    #[serde(default)]
    pub tools: Vec<ApiToolConfig>,
}

/// One adapter tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToolConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub api: ApiSpec,
    /// JSON-Schema for the tool's arguments. Must be an object schema.
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default)]
    pub response: ResponseSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSpec>,
}

fn default_parameters() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GET => "GET",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::DELETE => "DELETE",
        }
    }
}

/// HTTP request template. Header and query values, the URL, and the body
/// may contain `{{data.x}}` / `{{env.Y}}` tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, Value>,
    #[serde(default)]
    pub query_params: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    /// Additional attempts after the first on retriable failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

impl ApiSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Response classification and transformation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    /// Transformation expression evaluated on the decoded JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonata: Option<String>,
    /// Dotted path to an error message inside a failed body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,
    /// Truthiness expression over the body; absent means "HTTP 2xx".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_condition: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthConfig>,
    /// Host suffix allow-list for the rendered URL. Empty means any host.
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<RateLimitConfig>,
}

/// Authentication strategy config. `type` selects the strategy; the other
/// fields are strategy-specific and may reference `{{env.X}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Header name for the `apikey` strategy. Defaults to `X-API-Key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub max_requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_window_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Entry TTL in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    /// Whether error results are cached too.
    #[serde(default)]
    pub cache_errors: bool,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_cache_max_size() -> usize {
    DEFAULT_CACHE_MAX_SIZE
}

impl ApiToolConfig {
    pub fn cache_enabled(&self) -> bool {
        self.cache.as_ref().map(|c| c.enabled).unwrap_or(false)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(
            self.cache
                .as_ref()
                .map(|c| c.ttl)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
        )
    }
}
