// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Error Taxonomy
//!
//! Every fallible hub operation returns a [`HubError`]. Errors are classified
//! into five numeric ranges, one per [`ErrorCategory`]:
//!
//! | Range | Category | Examples |
//! |-------|----------|----------|
//! | 1000–1999 | Configuration | invalid server/group config, schema violation, missing env |
//! | 2000–2999 | Connection | startup failed, timeout, refused, auth failed |
//! | 3000–3999 | Runtime | tool-not-found, access-denied, service-unavailable |
//! | 4000–4999 | Validation | missing param, type mismatch, bad value |
//! | 5000–5999 | System | internal, out-of-memory, timeout, unknown |
//!
//! The retry executor (`infrastructure::retry`) consults
//! [`HubError::is_retriable`]: all Connection codes plus
//! `service-unavailable`, `disconnected`, and the system `timeout` are
//! retriable; everything else surfaces to the caller immediately.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Stable numeric code for a hub error. The discriminant is the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration (1000–1999)
    InvalidServerConfig = 1000,
    InvalidGroupConfig = 1001,
    SchemaViolation = 1002,
    MissingConfigFile = 1003,
    MissingEnvVar = 1004,

    // Connection (2000–2999)
    ServerStartupFailed = 2000,
    NetworkUnreachable = 2001,
    AuthenticationFailed = 2002,
    ServerUnavailable = 2003,
    ConnectionTimeout = 2004,
    ConnectionRefused = 2005,
    /// An upstream HTTP service answered 5xx / 429.
    UpstreamUnavailable = 2006,

    // Runtime (3000–3999)
    ToolExecutionFailed = 3000,
    ServerDisconnected = 3001,
    InvalidToolArguments = 3002,
    ToolNotFound = 3003,
    GroupNotFound = 3004,
    AccessDenied = 3005,
    ServiceUnavailable = 3006,

    // Validation (4000–4999)
    BadRequestFormat = 4000,
    MissingParameter = 4001,
    TypeMismatch = 4002,
    InvalidValue = 4003,

    // System (5000–5999)
    Internal = 5000,
    OutOfMemory = 5001,
    SystemTimeout = 5002,
    Unknown = 5003,
}

impl ErrorCode {
    /// Numeric wire code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Category derived from the code's numeric range.
    pub fn category(self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Configuration,
            2000..=2999 => ErrorCategory::Connection,
            3000..=3999 => ErrorCategory::Runtime,
            4000..=4999 => ErrorCategory::Validation,
            _ => ErrorCategory::System,
        }
    }

    /// Kebab-case identifier used in user-visible error text.
    pub fn slug(self) -> &'static str {
        match self {
            Self::InvalidServerConfig => "invalid-server-config",
            Self::InvalidGroupConfig => "invalid-group-config",
            Self::SchemaViolation => "schema-violation",
            Self::MissingConfigFile => "missing-config-file",
            Self::MissingEnvVar => "missing-env-var",
            Self::ServerStartupFailed => "startup-failed",
            Self::NetworkUnreachable => "network-unreachable",
            Self::AuthenticationFailed => "auth-failed",
            Self::ServerUnavailable => "server-unavailable",
            Self::ConnectionTimeout => "timeout",
            Self::ConnectionRefused => "refused",
            Self::UpstreamUnavailable => "service-unavailable",
            Self::ToolExecutionFailed => "tool-execution-failed",
            Self::ServerDisconnected => "disconnected",
            Self::InvalidToolArguments => "invalid-arguments",
            Self::ToolNotFound => "tool-not-found",
            Self::GroupNotFound => "group-not-found",
            Self::AccessDenied => "access-denied",
            Self::ServiceUnavailable => "service-unavailable",
            Self::BadRequestFormat => "bad-request-format",
            Self::MissingParameter => "missing-parameter",
            Self::TypeMismatch => "type-mismatch",
            Self::InvalidValue => "invalid-value",
            Self::Internal => "internal",
            Self::OutOfMemory => "out-of-memory",
            Self::SystemTimeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Default severity for this code.
    pub fn default_severity(self) -> Severity {
        match self {
            Self::AuthenticationFailed | Self::AccessDenied => Severity::High,
            Self::ToolNotFound | Self::GroupNotFound => Severity::Low,
            Self::Internal | Self::OutOfMemory => Severity::Critical,
            Self::SystemTimeout | Self::Unknown => Severity::High,
            _ => match self.category() {
                ErrorCategory::Configuration => Severity::High,
                ErrorCategory::Connection => Severity::Medium,
                ErrorCategory::Runtime => Severity::Medium,
                ErrorCategory::Validation => Severity::Low,
                ErrorCategory::System => Severity::Critical,
            },
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

/// One of the five reserved code ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Runtime,
    Validation,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Configuration => "Configuration",
            Self::Connection => "Connection",
            Self::Runtime => "Runtime",
            Self::Validation => "Validation",
            Self::System => "System",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The hub-wide error value.
///
/// `Display` renders the user-visible shape `<category>: <slug>: <message>`;
/// callers that surface a [`crate::domain::tool::ToolResult`] use that text
/// verbatim. Stack traces and internal context never reach callers.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {}: {}", .code.category(), .code.slug(), .message)]
pub struct HubError {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    /// Structured payload safe to show to operators (not end callers).
    pub details: Option<Value>,
    /// Where the error was raised (server id, tool id, group id).
    pub context: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl HubError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            details: None,
            context: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Whether the retry executor may re-attempt the failed operation.
    ///
    /// The allow-list is fixed: every Connection code, plus
    /// `service-unavailable`, `disconnected`, and the system `timeout`.
    pub fn is_retriable(&self) -> bool {
        self.category() == ErrorCategory::Connection
            || matches!(
                self.code,
                ErrorCode::ServiceUnavailable
                    | ErrorCode::ServerDisconnected
                    | ErrorCode::SystemTimeout
            )
    }
}

impl Serialize for HubError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("HubError", 6)?;
        s.serialize_field("code", &self.code)?;
        s.serialize_field("category", &self.category())?;
        s.serialize_field("severity", &self.severity)?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("details", &self.details)?;
        s.serialize_field("timestamp", &self.timestamp)?;
        s.end()
    }
}
