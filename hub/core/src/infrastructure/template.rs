// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Template & Env Resolver
//!
//! Rewrites configuration values (strings, arrays, object trees) by
//! substituting `{{env.NAME}}` and `{{data.PATH}}` tokens. Two rules:
//!
//! - a string leaf that is *exactly* one token is replaced by the referenced
//!   value verbatim, preserving its JSON type;
//! - a string with surrounding text gets spliced, with primitives coerced to
//!   their JSON text form.
//!
//! A missing environment variable is a configuration error; a missing data
//! reference resolves to `null`. Rendering is a pure function of
//! `(template, data, env)`: the environment is passed in as a snapshot, not
//! read ambiently.

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::domain::error::{ErrorCode, HubError};
use crate::domain::expression::lookup_path;

pub struct TemplateResolver {
    token_re: Regex,
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            // {{env.NAME}} or {{data.some.path[0]}}
            token_re: Regex::new(r"\{\{\s*(env|data)\.([A-Za-z0-9_][A-Za-z0-9_.\[\]-]*)\s*\}\}")
                .expect("template token pattern is valid"),
        }
    }

    /// Resolve every token in `template`, recursing through arrays and
    /// object values. Object keys are never templated.
    pub fn resolve(
        &self,
        template: &Value,
        data: &Value,
        env: &HashMap<String, String>,
    ) -> Result<Value, HubError> {
        match template {
            Value::String(s) => self.resolve_str(s, data, env),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, data, env))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.resolve(value, data, env)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve one string leaf.
    pub fn resolve_str(
        &self,
        template: &str,
        data: &Value,
        env: &HashMap<String, String>,
    ) -> Result<Value, HubError> {
        // Whole-token leaves keep the referenced value's JSON type.
        if let Some(caps) = self.token_re.captures(template) {
            if caps.get(0).map(|m| m.as_str()) == Some(template.trim()) {
                return self.lookup(&caps[1], &caps[2], data, env);
            }
        }

        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in self.token_re.captures_iter(template) {
            let whole = caps.get(0).expect("capture 0 always present");
            out.push_str(&template[last..whole.start()]);
            let value = self.lookup(&caps[1], &caps[2], data, env)?;
            out.push_str(&splice_text(&value));
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(Value::String(out))
    }

    /// Render a string template and require a string-typed result.
    pub fn resolve_to_string(
        &self,
        template: &str,
        data: &Value,
        env: &HashMap<String, String>,
    ) -> Result<String, HubError> {
        Ok(match self.resolve_str(template, data, env)? {
            Value::String(s) => s,
            other => splice_text(&other),
        })
    }

    fn lookup(
        &self,
        namespace: &str,
        path: &str,
        data: &Value,
        env: &HashMap<String, String>,
    ) -> Result<Value, HubError> {
        match namespace {
            "env" => env
                .get(path)
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| {
                    HubError::new(
                        ErrorCode::MissingEnvVar,
                        format!("missing env variable {path:?} referenced by template"),
                    )
                }),
            _ => Ok(lookup_path(data, path).unwrap_or(Value::Null)),
        }
    }

    /// Every `{{env.X}}` name referenced anywhere inside `template`. Used at
    /// load time to disable tools whose environment is incomplete.
    pub fn referenced_env_vars(&self, template: &Value) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_env_vars(template, &mut names);
        names
    }

    fn collect_env_vars(&self, template: &Value, names: &mut BTreeSet<String>) {
        match template {
            Value::String(s) => {
                for caps in self.token_re.captures_iter(s) {
                    if &caps[1] == "env" {
                        names.insert(caps[2].to_string());
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_env_vars(item, names);
                }
            }
            Value::Object(map) => {
                for value in map.values() {
                    self.collect_env_vars(value, names);
                }
            }
            _ => {}
        }
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Text form used when a token sits inside surrounding text: strings splice
/// raw, other JSON values use their serialized form.
fn splice_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
