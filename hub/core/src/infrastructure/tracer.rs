// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Message Tracer
//!
//! Capped per-server ring buffer of JSON-RPC traffic passing through the
//! connection manager. Appends must never fail an RPC: the tracer has no
//! fallible paths and takes its lock only for O(1) buffer work. Queries
//! return cloned snapshots; per-server append order is preserved, ordering
//! across servers is best-effort by timestamp.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

pub const DEFAULT_TRACE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
    Notification,
}

/// One traced message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub server_id: String,
    pub kind: MessageKind,
    pub method: String,
    pub content: Value,
    /// Set on responses: wall time of the paired request.
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

pub struct MessageTracer {
    buffers: RwLock<HashMap<String, VecDeque<MessageRecord>>>,
    capacity: usize,
}

impl MessageTracer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, record: MessageRecord) {
        let mut buffers = self.buffers.write();
        let buffer = buffers
            .entry(record.server_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(64)));
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(record);
    }

    pub fn record_request(&self, server_id: &str, method: &str, payload: Value) {
        self.append(MessageRecord {
            id: Uuid::new_v4(),
            server_id: server_id.to_string(),
            kind: MessageKind::Request,
            method: method.to_string(),
            content: payload,
            duration_ms: None,
            timestamp: Utc::now(),
        });
    }

    pub fn record_response(
        &self,
        server_id: &str,
        method: &str,
        content: Value,
        duration_ms: u64,
    ) {
        self.append(MessageRecord {
            id: Uuid::new_v4(),
            server_id: server_id.to_string(),
            kind: MessageKind::Response,
            method: method.to_string(),
            content,
            duration_ms: Some(duration_ms),
            timestamp: Utc::now(),
        });
    }

    pub fn record_notification(&self, server_id: &str, method: &str, payload: Value) {
        self.append(MessageRecord {
            id: Uuid::new_v4(),
            server_id: server_id.to_string(),
            kind: MessageKind::Notification,
            method: method.to_string(),
            content: payload,
            duration_ms: None,
            timestamp: Utc::now(),
        });
    }

    /// Snapshot query. `limit = 0` means no limit; when a limit applies the
    /// newest records win, returned oldest first.
    pub fn query(
        &self,
        server_id: Option<&str>,
        kind: Option<MessageKind>,
        limit: usize,
    ) -> Vec<MessageRecord> {
        let buffers = self.buffers.read();
        let mut records: Vec<MessageRecord> = match server_id {
            Some(id) => buffers
                .get(id)
                .map(|buf| buf.iter().cloned().collect())
                .unwrap_or_default(),
            None => {
                let mut all: Vec<MessageRecord> =
                    buffers.values().flat_map(|buf| buf.iter().cloned()).collect();
                all.sort_by_key(|r| r.timestamp);
                all
            }
        };

        if let Some(kind) = kind {
            records.retain(|r| r.kind == kind);
        }
        if limit > 0 && records.len() > limit {
            records.drain(..records.len() - limit);
        }
        records
    }

    /// Number of records currently held for one server.
    pub fn len(&self, server_id: &str) -> usize {
        self.buffers
            .read()
            .get(server_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

impl Default for MessageTracer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}
