// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT

pub mod adapter;
pub mod group_resolver;
pub mod hub_service;

pub use adapter::ApiToolAdapter;
pub use group_resolver::GroupResolver;
pub use hub_service::{Diagnostics, HubService};
