// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # mcp-hub-core
//!
//! Runtime heart of the MCP hub: a long-running service that owns
//! connections to backend MCP servers, scopes their tools through groups,
//! and adapts declarative REST configs into synthetic tools.
//!
//! ## Layer Structure
//!
//! ```text
//! application/    ← HubService façade, group resolver, API adapter
//!     ↓
//! domain/         ← value objects, error taxonomy, validation, expressions
//!     ↓
//! infrastructure/ ← rmcp connections, registry, tracer, cache, HTTP, bus
//! ```
//!
//! ## Key Components
//!
//! | Component | Module |
//! |-----------|--------|
//! | Tool registry + events | [`infrastructure::registry`] |
//! | Group resolver | [`application::group_resolver`] |
//! | Server lifecycle manager | [`infrastructure::connection_manager`] |
//! | Message tracer | [`infrastructure::tracer`] |
//! | Hub service (`ListTools` / `CallTool`) | [`application::hub_service`] |
//! | API-to-MCP adapter | [`application::adapter`] |
//! | Template & env resolver | [`infrastructure::template`] |
//! | Response cache | [`infrastructure::response_cache`] |
//! | Parameter validator | [`domain::validation`] |
//! | Auth applicator | [`infrastructure::auth`] |
//! | Error taxonomy & retry | [`domain::error`], [`infrastructure::retry`] |
//!
//! Construction is explicit: build a [`runtime::HubRuntime`] from a
//! [`infrastructure::config_loader::HubConfig`] snapshot, `init` it, use
//! the [`application::HubService`] handle, `shutdown` when done. There are
//! no module-level singletons.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod runtime;

pub use application::{Diagnostics, HubService};
pub use domain::error::{ErrorCategory, ErrorCode, HubError, Severity};
pub use domain::tool::{ContentBlock, Tool, ToolOrigin, ToolResult};
pub use infrastructure::config_loader::{load_from_paths, HubConfig};
pub use runtime::HubRuntime;
