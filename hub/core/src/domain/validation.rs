// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Parameter Validator
//!
//! Runtime JSON-Schema subset validator for adapter tool arguments. The
//! supported surface is deliberately small: `type`, `required`,
//! `properties`, `additionalProperties`, `items`, `enum`,
//! `minimum`/`maximum`, `minLength`/`maxLength`, `minItems`/`maxItems`,
//! `pattern`, `format` (email, date, date-time; syntactic only) and
//! `default` (injected for missing optional fields).
//!
//! Validation never short-circuits: every violation is collected so a caller
//! sees all problems at once. Schemas themselves are sanity-checked at
//! registration time via [`check_schema`]; inconsistent schemas are rejected
//! before a tool is ever registered.

use serde_json::{Map, Value};

use crate::domain::error::ErrorCode;

/// One aggregated validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path to the offending value; empty for the root.
    pub path: String,
    pub message: String,
    pub code: ErrorCode,
}

impl ValidationError {
    fn new(path: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
            code,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Validate `args` against `schema`, applying property defaults.
///
/// Returns the argument object with defaults injected, or every violation
/// found.
pub fn validate(schema: &Value, args: &Value) -> Result<Value, Vec<ValidationError>> {
    let mut value = args.clone();
    let mut errors = Vec::new();
    validate_value(schema, &mut value, "", &mut errors);
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

/// Registration-time consistency checks. A config whose schema fails any of
/// these is rejected outright:
///
/// - numeric/length/item bounds inverted (`minimum > maximum`, ...)
/// - a `required` name missing from `properties`
/// - a non-object top-level schema
/// - an uncompilable `pattern`
pub fn check_schema(schema: &Value) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let top_type = schema.get("type").and_then(Value::as_str);
    if top_type != Some("object") {
        errors.push(ValidationError::new(
            "",
            ErrorCode::SchemaViolation,
            "top-level parameter schema must have type \"object\"",
        ));
    }

    check_schema_node(schema, "", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_schema_node(schema: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(obj) = schema.as_object() else {
        return;
    };

    let bound_pairs = [
        ("minimum", "maximum"),
        ("minLength", "maxLength"),
        ("minItems", "maxItems"),
    ];
    for (lo_key, hi_key) in bound_pairs {
        if let (Some(lo), Some(hi)) = (
            obj.get(lo_key).and_then(Value::as_f64),
            obj.get(hi_key).and_then(Value::as_f64),
        ) {
            if lo > hi {
                errors.push(ValidationError::new(
                    path,
                    ErrorCode::SchemaViolation,
                    format!("{lo_key} ({lo}) exceeds {hi_key} ({hi})"),
                ));
            }
        }
    }

    if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
        if regex::Regex::new(pattern).is_err() {
            errors.push(ValidationError::new(
                path,
                ErrorCode::SchemaViolation,
                format!("pattern {pattern:?} is not a valid regular expression"),
            ));
        }
    }

    let properties = obj.get("properties").and_then(Value::as_object);

    if let Some(required) = obj.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !properties.map(|p| p.contains_key(name)).unwrap_or(false) {
                errors.push(ValidationError::new(
                    path,
                    ErrorCode::SchemaViolation,
                    format!("required property {name:?} is not declared in properties"),
                ));
            }
        }
    }

    if let Some(properties) = properties {
        for (name, sub) in properties {
            check_schema_node(sub, &join(path, name), errors);
        }
    }
    if let Some(items) = obj.get("items") {
        check_schema_node(items, &format!("{path}[]"), errors);
    }
    if let Some(additional) = obj.get("additionalProperties") {
        if additional.is_object() {
            check_schema_node(additional, path, errors);
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        "number" => value.is_number(),
        _ => true,
    }
}

fn validate_value(schema: &Value, value: &mut Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(obj) = schema.as_object() else {
        return;
    };

    if let Some(expected) = obj.get("type").and_then(Value::as_str) {
        if !matches_type(value, expected) {
            errors.push(ValidationError::new(
                path,
                ErrorCode::TypeMismatch,
                format!("expected {expected}, got {}", type_name(value)),
            ));
            return;
        }
    }

    if let Some(allowed) = obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("value is not one of the allowed alternatives ({} options)", allowed.len()),
            ));
        }
    }

    match value {
        Value::Number(_) => validate_number(obj, value, path, errors),
        Value::String(s) => validate_string(obj, s, path, errors),
        Value::Array(items) => validate_array(obj, items, path, errors),
        Value::Object(map) => validate_object(obj, map, path, errors),
        _ => {}
    }
}

fn validate_number(
    schema: &Map<String, Value>,
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let Some(n) = value.as_f64() else { return };
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if n < min {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("{n} is below the minimum {min}"),
            ));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if n > max {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("{n} is above the maximum {max}"),
            ));
        }
    }
}

fn validate_string(
    schema: &Map<String, Value>,
    s: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let len = s.chars().count();
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if (len as u64) < min {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("length {len} is below minLength {min}"),
            ));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if (len as u64) > max {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("length {len} is above maxLength {max}"),
            ));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        // Schema sanity is checked at registration; an uncompilable pattern
        // here is treated as a mismatch.
        match regex::Regex::new(pattern) {
            Ok(re) if re.is_match(s) => {}
            _ => errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("value does not match pattern {pattern:?}"),
            )),
        }
    }
    if let Some(format) = schema.get("format").and_then(Value::as_str) {
        if !matches_format(s, format) {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("value is not a valid {format}"),
            ));
        }
    }
}

fn matches_format(s: &str, format: &str) -> bool {
    match format {
        "email" => {
            let Some((local, domain)) = s.split_once('@') else {
                return false;
            };
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !s.contains(char::is_whitespace)
        }
        "date" => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        "date-time" => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        // Unknown formats are not enforced.
        _ => true,
    }
}

fn validate_array(
    schema: &Map<String, Value>,
    items: &mut Vec<Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("{} items is below minItems {min}", items.len()),
            ));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            errors.push(ValidationError::new(
                path,
                ErrorCode::InvalidValue,
                format!("{} items is above maxItems {max}", items.len()),
            ));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (i, item) in items.iter_mut().enumerate() {
            validate_value(item_schema, item, &format!("{path}[{i}]"), errors);
        }
    }
}

fn validate_object(
    schema: &Map<String, Value>,
    map: &mut Map<String, Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(name) {
                errors.push(ValidationError::new(
                    &join(path, name),
                    ErrorCode::MissingParameter,
                    "missing required parameter",
                ));
            }
        }
    }

    if let Some(properties) = properties {
        // Defaults first, so the injected value is validated like any other.
        for (name, sub) in properties {
            if !map.contains_key(name) {
                if let Some(default) = sub.get("default") {
                    map.insert(name.clone(), default.clone());
                }
            }
        }
        for (name, sub) in properties {
            if let Some(v) = map.get_mut(name) {
                validate_value(sub, v, &join(path, name), errors);
            }
        }
    }

    match schema.get("additionalProperties") {
        Some(Value::Bool(false)) => {
            for name in map.keys() {
                if !properties.map(|p| p.contains_key(name)).unwrap_or(false) {
                    errors.push(ValidationError::new(
                        &join(path, name),
                        ErrorCode::BadRequestFormat,
                        "unexpected additional property",
                    ));
                }
            }
        }
        Some(extra_schema @ Value::Object(_)) => {
            let declared: Vec<String> = properties
                .map(|p| p.keys().cloned().collect())
                .unwrap_or_default();
            for (name, v) in map.iter_mut() {
                if !declared.contains(name) {
                    validate_value(extra_schema, v, &join(path, name), errors);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_args_pass_and_defaults_apply() {
        let schema = json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1},
                "limit": {"type": "integer", "minimum": 1, "maximum": 100, "default": 10}
            },
            "required": ["query"]
        });
        let validated = validate(&schema, &json!({"query": "j"})).unwrap();
        assert_eq!(validated["limit"], 10);
        assert_eq!(validated["query"], "j");
    }

    #[test]
    fn test_errors_are_aggregated() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name", "age"]
        });
        let errors = validate(&schema, &json!({"age": -3})).unwrap_err();
        // missing `name` and negative `age` both reported
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.path == "name" && e.code == ErrorCode::MissingParameter));
        assert!(errors
            .iter()
            .any(|e| e.path == "age" && e.code == ErrorCode::InvalidValue));
    }

    #[test]
    fn test_type_mismatch_reports_actual_type() {
        let schema = json!({
            "type": "object",
            "properties": {"count": {"type": "integer"}}
        });
        let errors = validate(&schema, &json!({"count": "three"})).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::TypeMismatch);
        assert_eq!(errors[0].message, "expected integer, got string");
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        let schema = json!({"type": "object", "properties": {"n": {"type": "integer"}}});
        assert!(validate(&schema, &json!({"n": 3.0})).is_ok());
        assert!(validate(&schema, &json!({"n": 3.5})).is_err());
    }

    #[test]
    fn test_enum_pattern_and_formats() {
        let schema = json!({
            "type": "object",
            "properties": {
                "kind": {"type": "string", "enum": ["a", "b"]},
                "code": {"type": "string", "pattern": "^[A-Z]{3}$"},
                "mail": {"type": "string", "format": "email"},
                "day": {"type": "string", "format": "date"},
                "at": {"type": "string", "format": "date-time"}
            }
        });
        let good = json!({
            "kind": "a",
            "code": "ABC",
            "mail": "user@example.com",
            "day": "2026-01-31",
            "at": "2026-01-31T10:00:00Z"
        });
        assert!(validate(&schema, &good).is_ok());

        let bad = json!({
            "kind": "c",
            "code": "abc",
            "mail": "not-an-email",
            "day": "31/01/2026",
            "at": "yesterday"
        });
        let errors = validate(&schema, &bad).unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_nested_arrays_and_additional_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "maxItems": 3
                }
            },
            "additionalProperties": false
        });
        let errors = validate(
            &schema,
            &json!({"tags": ["a", 2, "c", "d"], "extra": true}),
        )
        .unwrap_err();
        assert!(errors.iter().any(|e| e.path == "tags[1]"));
        assert!(errors.iter().any(|e| e.path == "tags"));
        assert!(errors
            .iter()
            .any(|e| e.path == "extra" && e.code == ErrorCode::BadRequestFormat));
    }

    #[test]
    fn test_schema_consistency_rejections() {
        // Inverted bounds
        let errors = check_schema(&json!({
            "type": "object",
            "properties": {"n": {"type": "number", "minimum": 10, "maximum": 1}}
        }))
        .unwrap_err();
        assert!(errors[0].message.contains("minimum"));

        // required name not declared
        let errors = check_schema(&json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a", "b"]
        }))
        .unwrap_err();
        assert!(errors[0].message.contains("\"b\""));

        // non-object top level
        assert!(check_schema(&json!({"type": "string"})).is_err());

        // sane schema passes
        assert!(check_schema(&json!({
            "type": "object",
            "properties": {"a": {"type": "string", "minLength": 1, "maxLength": 5}},
            "required": ["a"]
        }))
        .is_ok());
    }
}
