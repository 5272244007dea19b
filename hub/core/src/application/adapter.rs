// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # API-to-MCP Adapter
//!
//! Turns declarative [`ApiToolConfig`]s into synthetic tools. `execute`
//! runs the pipeline: validate → render → authenticate → cache lookup →
//! HTTP (with retry) → classify → transform → cache store. Pipeline
//! failures come back as error [`ToolResult`]s, never panics; only an
//! unknown tool id is a hard error.
//!
//! Load-time gates: parameter schemas are sanity-checked, auth configs are
//! validated, and a tool whose `{{env.X}}` references cannot be resolved is
//! kept *disabled* with a loader warning instead of being registered.

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::api_tool::{ApiToolConfig, ApiToolsDoc};
use crate::domain::error::{ErrorCode, HubError};
use crate::domain::expression::Expression;
use crate::domain::tool::{Tool, ToolOrigin, ToolResult};
use crate::domain::{expression, validation};
use crate::infrastructure::auth::AuthApplicator;
use crate::infrastructure::http_executor::{HttpExecutor, RenderedRequest, UpstreamResponse};
use crate::infrastructure::registry::ToolRegistry;
use crate::infrastructure::response_cache::{cache_key, ResponseCache};
use crate::infrastructure::template::TemplateResolver;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct AdapterTool {
    config: ApiToolConfig,
    /// False when the tool's env references were unresolved at load.
    enabled: bool,
}

pub struct ApiToolAdapter {
    tools: RwLock<HashMap<String, AdapterTool>>,
    resolver: TemplateResolver,
    auth: AuthApplicator,
    http: Arc<HttpExecutor>,
    cache: Arc<ResponseCache>,
    limiters: DashMap<String, Arc<DirectLimiter>>,
    /// Environment snapshot taken at construction; rendering never reads
    /// the ambient process environment.
    env: HashMap<String, String>,
}

impl ApiToolAdapter {
    pub fn new(
        http: Arc<HttpExecutor>,
        cache: Arc<ResponseCache>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            resolver: TemplateResolver::new(),
            auth: AuthApplicator::new(),
            http,
            cache,
            limiters: DashMap::new(),
            env,
        }
    }

    pub fn with_process_env(http: Arc<HttpExecutor>, cache: Arc<ResponseCache>) -> Self {
        Self::new(http, cache, std::env::vars().collect())
    }

    /// Load (or reload) the adapter document. Previously registered adapter
    /// tools are replaced atomically. Returns loader warnings.
    pub fn load(&self, doc: &ApiToolsDoc, registry: &ToolRegistry) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut tools = HashMap::new();

        registry.unregister_source(crate::domain::tool::ADAPTER_SOURCE_ID);
        self.limiters.clear();

        for config in &doc.tools {
            let mut enabled = true;

            if let Err(errors) = validation::check_schema(&config.parameters) {
                let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                warnings.push(format!(
                    "api tool {:?} rejected: inconsistent parameter schema: {}",
                    config.id,
                    details.join("; ")
                ));
                continue;
            }

            if let Some(auth) = config.security.as_ref().and_then(|s| s.authentication.as_ref()) {
                let issues = self.auth.validate_config(auth);
                if !issues.is_empty() {
                    warnings.push(format!(
                        "api tool {:?} rejected: {}",
                        config.id,
                        issues.join("; ")
                    ));
                    continue;
                }
            }

            // Every env var referenced anywhere in the request template or
            // credentials must resolve now, or the tool ships disabled.
            let mut referenced = self
                .resolver
                .referenced_env_vars(&serde_json::to_value(&config.api).unwrap_or(Value::Null));
            if let Some(auth) = config.security.as_ref().and_then(|s| s.authentication.as_ref()) {
                referenced.extend(self.auth.required_env_vars(auth));
            }
            let missing: Vec<String> = referenced
                .into_iter()
                .filter(|name| !self.env.contains_key(name))
                .collect();
            if !missing.is_empty() {
                warnings.push(format!(
                    "api tool {:?} disabled: missing env variables {:?}",
                    config.id, missing
                ));
                enabled = false;
            }

            if let Some(rate) = config.security.as_ref().and_then(|s| s.rate.as_ref()) {
                match build_limiter(rate.max_requests, rate.window_seconds) {
                    Some(limiter) => {
                        self.limiters.insert(config.id.clone(), Arc::new(limiter));
                    }
                    None => warnings.push(format!(
                        "api tool {:?}: unusable rate limit config, limiter disabled",
                        config.id
                    )),
                }
            }

            if enabled {
                let tool = Tool {
                    name: config.name.clone(),
                    description: config.description.clone(),
                    input_schema: config.parameters.clone(),
                    origin: ToolOrigin::Adapter {
                        tool_id: config.id.clone(),
                    },
                };
                if let Err(err) = registry.register(tool) {
                    warnings.push(format!("api tool {:?} rejected: {err}", config.id));
                    continue;
                }
            }

            tools.insert(config.id.clone(), AdapterTool {
                config: config.clone(),
                enabled,
            });
        }

        info!(
            tools = tools.len(),
            warnings = warnings.len(),
            "adapter document loaded"
        );
        for warning in &warnings {
            warn!("{warning}");
        }
        *self.tools.write() = tools;
        warnings
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().values().filter(|t| t.enabled).count()
    }

    /// Run the adapter pipeline for `tool_id`.
    pub async fn execute(
        &self,
        tool_id: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, HubError> {
        let (config, enabled) = {
            let tools = self.tools.read();
            let tool = tools.get(tool_id).ok_or_else(|| {
                HubError::new(
                    ErrorCode::ToolNotFound,
                    format!("adapter tool {tool_id:?} is not configured"),
                )
            })?;
            (tool.config.clone(), tool.enabled)
        };

        if !enabled {
            return Ok(ToolResult::from(HubError::new(
                ErrorCode::MissingEnvVar,
                format!("api tool {tool_id:?} is disabled: required env variables are unset"),
            )));
        }

        if let Some(limiter) = self.limiters.get(tool_id).map(|l| Arc::clone(l.value())) {
            if limiter.check().is_err() {
                metrics::counter!("hub_adapter_rate_limited_total").increment(1);
                return Ok(ToolResult::from(HubError::new(
                    ErrorCode::AccessDenied,
                    format!("rate limit exceeded for api tool {tool_id:?}"),
                )));
            }
        }

        // 1. Validate, aggregating every violation.
        let data = match validation::validate(&config.parameters, &args) {
            Ok(validated) => validated,
            Err(errors) => {
                let joined = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Ok(ToolResult::error_text(format!("参数验证失败: {joined}")));
            }
        };

        // 2. Render the request from templates.
        let request = match self.render_request(&config, &data) {
            Ok(request) => request,
            Err(err) => return Ok(ToolResult::from(err)),
        };

        // Host allow-list applies to the *rendered* URL.
        if let Err(err) = check_allowlist(&config, &request.url) {
            return Ok(ToolResult::from(err));
        }

        // 3. Authentication.
        let auth_config = config
            .security
            .as_ref()
            .and_then(|s| s.authentication.as_ref());
        let request = match self.auth.apply(request, auth_config, &self.env) {
            Ok(request) => request,
            Err(err) => return Ok(ToolResult::from(err)),
        };

        // 4. Cache lookup.
        let key = cache_key(&config.id, &data);
        if config.cache_enabled() {
            if let Some(hit) = self.cache.get(&key) {
                if let Ok(result) = serde_json::from_value::<ToolResult>(hit) {
                    debug!(tool = %tool_id, "adapter cache hit");
                    return Ok(result);
                }
            }
        }

        // 5. HTTP with the retry policy.
        let response = match self
            .http
            .execute_with_retry(&request, config.api.max_attempts(), cancel)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                metrics::counter!("hub_adapter_failures_total").increment(1);
                return Ok(ToolResult::from(err));
            }
        };

        // 6–7. Classify, then transform.
        let result = match self.classify(&config, &response) {
            Ok(body) => self.transform(&config, &body),
            Err(error_result) => error_result,
        };

        // 8. Cache store.
        let cache_errors = config
            .cache
            .as_ref()
            .map(|c| c.cache_errors)
            .unwrap_or(false);
        if config.cache_enabled() && (!result.is_error || cache_errors) {
            if let Ok(serialized) = serde_json::to_value(&result) {
                self.cache.set(&key, serialized, config.cache_ttl());
            }
        }

        Ok(result)
    }

    fn render_request(
        &self,
        config: &ApiToolConfig,
        data: &Value,
    ) -> Result<RenderedRequest, HubError> {
        let url = self
            .resolver
            .resolve_to_string(&config.api.url, data, &self.env)?;

        let mut headers = Vec::new();
        for (name, template) in &config.api.headers {
            match self.resolver.resolve(template, data, &self.env)? {
                Value::Null => continue,
                value => headers.push((name.clone(), text_form(&value))),
            }
        }

        let mut query = Vec::new();
        for (name, template) in &config.api.query_params {
            match self.resolver.resolve(template, data, &self.env)? {
                Value::Null => continue,
                value => query.push((name.clone(), text_form(&value))),
            }
        }
        query.sort();
        headers.sort();

        let body = match &config.api.body {
            Some(template) => Some(self.resolver.resolve(template, data, &self.env)?),
            None => None,
        };

        Ok(RenderedRequest {
            method: config.api.method,
            url,
            headers,
            query,
            body,
            timeout: config.api.timeout(),
        })
    }

    /// Success iff `successCondition` is truthy over the body, defaulting
    /// to "HTTP 2xx". On failure the error text comes from `errorPath`
    /// when it resolves, else the whole body.
    fn classify(
        &self,
        config: &ApiToolConfig,
        response: &UpstreamResponse,
    ) -> Result<Value, ToolResult> {
        let success = match &config.response.success_condition {
            Some(condition) => {
                let verdict = Expression::parse(condition)
                    .and_then(|expr| expr.evaluate_bool(&response.body));
                match verdict {
                    Ok(success) => success,
                    Err(err) => return Err(ToolResult::from(err)),
                }
            }
            None => response.is_2xx(),
        };

        if success {
            return Ok(response.body.clone());
        }

        let text = config
            .response
            .error_path
            .as_deref()
            .and_then(|path| expression::lookup_path(&response.body, path))
            .map(|v| text_form(&v))
            .unwrap_or_else(|| text_form(&response.body));
        Err(ToolResult::error_text(text))
    }

    /// Apply `jsonata` when configured; the result lands in one text
    /// block, strings raw, everything else JSON-serialized.
    fn transform(&self, config: &ApiToolConfig, body: &Value) -> ToolResult {
        let value = match &config.response.jsonata {
            Some(expr) => {
                match Expression::parse(expr).and_then(|e| e.evaluate(body)) {
                    Ok(value) => value,
                    Err(err) => {
                        return ToolResult::error_text(format!("响应转换失败: {}", err.message));
                    }
                }
            }
            None => body.clone(),
        };
        ToolResult::text(text_form(&value))
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_allowlist(config: &ApiToolConfig, rendered_url: &str) -> Result<(), HubError> {
    let allowlist = config
        .security
        .as_ref()
        .map(|s| s.allowlist.as_slice())
        .unwrap_or(&[]);
    if allowlist.is_empty() {
        return Ok(());
    }
    let host = url::Url::parse(rendered_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    if allowlist.iter().any(|allowed| host.ends_with(allowed)) {
        Ok(())
    } else {
        Err(HubError::new(
            ErrorCode::AccessDenied,
            format!("host {host:?} is not in the tool's allowlist"),
        ))
    }
}

fn build_limiter(max_requests: u32, window_seconds: u64) -> Option<DirectLimiter> {
    let burst = NonZeroU32::new(max_requests)?;
    if window_seconds == 0 {
        return None;
    }
    let period = Duration::from_secs(window_seconds)
        .checked_div(max_requests)
        .filter(|p| !p.is_zero())?;
    Some(RateLimiter::direct(
        Quota::with_period(period)?.allow_burst(burst),
    ))
}
