// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Auth Applicator
//!
//! Applies the authentication strategy named by an adapter tool's
//! `security.authentication.type` to a rendered request. Strategies are
//! pure: they return the request with header modifications and touch
//! nothing else. Credential fields may reference `{{env.X}}`; resolution
//! happens here against the environment snapshot taken at init.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::api_tool::{AuthConfig, DEFAULT_API_KEY_HEADER};
use crate::domain::error::{ErrorCode, HubError};
use crate::infrastructure::http_executor::RenderedRequest;
use crate::infrastructure::template::TemplateResolver;

/// One authentication strategy.
trait AuthStrategy: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Return the request with this strategy's headers applied.
    fn apply(
        &self,
        request: RenderedRequest,
        config: &AuthConfig,
        resolver: &TemplateResolver,
        env: &HashMap<String, String>,
    ) -> Result<RenderedRequest, HubError>;

    /// Config problems, one message per issue.
    fn validate_config(&self, config: &AuthConfig) -> Vec<String>;
}

struct NoAuth;

impl AuthStrategy for NoAuth {
    fn kind(&self) -> &'static str {
        "none"
    }

    fn apply(
        &self,
        request: RenderedRequest,
        _config: &AuthConfig,
        _resolver: &TemplateResolver,
        _env: &HashMap<String, String>,
    ) -> Result<RenderedRequest, HubError> {
        Ok(request)
    }

    fn validate_config(&self, _config: &AuthConfig) -> Vec<String> {
        Vec::new()
    }
}

struct BearerAuth;

impl AuthStrategy for BearerAuth {
    fn kind(&self) -> &'static str {
        "bearer"
    }

    fn apply(
        &self,
        mut request: RenderedRequest,
        config: &AuthConfig,
        resolver: &TemplateResolver,
        env: &HashMap<String, String>,
    ) -> Result<RenderedRequest, HubError> {
        let token = resolve_field(resolver, config.token.as_deref(), "token", env)?;
        request.set_header("Authorization", format!("Bearer {token}"));
        Ok(request)
    }

    fn validate_config(&self, config: &AuthConfig) -> Vec<String> {
        match config.token.as_deref() {
            Some(t) if !t.is_empty() => Vec::new(),
            _ => vec!["bearer authentication requires a token".to_string()],
        }
    }
}

struct ApiKeyAuth;

impl AuthStrategy for ApiKeyAuth {
    fn kind(&self) -> &'static str {
        "apikey"
    }

    fn apply(
        &self,
        mut request: RenderedRequest,
        config: &AuthConfig,
        resolver: &TemplateResolver,
        env: &HashMap<String, String>,
    ) -> Result<RenderedRequest, HubError> {
        let token = resolve_field(resolver, config.token.as_deref(), "token", env)?;
        let header = config.header.as_deref().unwrap_or(DEFAULT_API_KEY_HEADER);
        request.set_header(header, token);
        Ok(request)
    }

    fn validate_config(&self, config: &AuthConfig) -> Vec<String> {
        match config.token.as_deref() {
            Some(t) if !t.is_empty() => Vec::new(),
            _ => vec!["apikey authentication requires a token".to_string()],
        }
    }
}

struct BasicAuth;

impl AuthStrategy for BasicAuth {
    fn kind(&self) -> &'static str {
        "basic"
    }

    fn apply(
        &self,
        mut request: RenderedRequest,
        config: &AuthConfig,
        resolver: &TemplateResolver,
        env: &HashMap<String, String>,
    ) -> Result<RenderedRequest, HubError> {
        let username = resolve_field(resolver, config.username.as_deref(), "username", env)?;
        let password = resolve_field(resolver, config.password.as_deref(), "password", env)?;
        let encoded = BASE64.encode(format!("{username}:{password}"));
        request.set_header("Authorization", format!("Basic {encoded}"));
        Ok(request)
    }

    fn validate_config(&self, config: &AuthConfig) -> Vec<String> {
        let mut issues = Vec::new();
        if config.username.as_deref().unwrap_or("").is_empty() {
            issues.push("basic authentication requires a username".to_string());
        }
        if config.password.as_deref().unwrap_or("").is_empty() {
            issues.push("basic authentication requires a password".to_string());
        }
        issues
    }
}

fn resolve_field(
    resolver: &TemplateResolver,
    raw: Option<&str>,
    field: &str,
    env: &HashMap<String, String>,
) -> Result<String, HubError> {
    let raw = raw.ok_or_else(|| {
        HubError::new(
            ErrorCode::SchemaViolation,
            format!("authentication config is missing {field:?}"),
        )
    })?;
    resolver.resolve_to_string(raw, &Value::Null, env)
}

/// Dispatches on `authConfig.type`. Unknown types are a configuration
/// error, surfaced both at validation and at apply time.
pub struct AuthApplicator {
    resolver: TemplateResolver,
}

impl AuthApplicator {
    pub fn new() -> Self {
        Self {
            resolver: TemplateResolver::new(),
        }
    }

    fn strategy(auth_type: &str) -> Result<&'static dyn AuthStrategy, HubError> {
        static NONE: NoAuth = NoAuth;
        static BEARER: BearerAuth = BearerAuth;
        static APIKEY: ApiKeyAuth = ApiKeyAuth;
        static BASIC: BasicAuth = BasicAuth;
        match auth_type {
            "none" => Ok(&NONE),
            "bearer" => Ok(&BEARER),
            "apikey" => Ok(&APIKEY),
            "basic" => Ok(&BASIC),
            other => Err(HubError::new(
                ErrorCode::SchemaViolation,
                format!("unknown authentication type {other:?}"),
            )),
        }
    }

    /// Apply the configured strategy; `None` config passes through.
    pub fn apply(
        &self,
        request: RenderedRequest,
        config: Option<&AuthConfig>,
        env: &HashMap<String, String>,
    ) -> Result<RenderedRequest, HubError> {
        let Some(config) = config else {
            return Ok(request);
        };
        Self::strategy(&config.auth_type)?.apply(request, config, &self.resolver, env)
    }

    /// All problems with an auth config, including an unknown type.
    pub fn validate_config(&self, config: &AuthConfig) -> Vec<String> {
        match Self::strategy(&config.auth_type) {
            Ok(strategy) => strategy.validate_config(config),
            Err(err) => vec![err.message],
        }
    }

    /// Env var names the strategy's credential fields reference.
    pub fn required_env_vars(&self, config: &AuthConfig) -> Vec<String> {
        let fields = serde_json::json!([
            config.token,
            config.username,
            config.password,
            config.header,
        ]);
        self.resolver
            .referenced_env_vars(&fields)
            .into_iter()
            .collect()
    }
}

impl Default for AuthApplicator {
    fn default() -> Self {
        Self::new()
    }
}
