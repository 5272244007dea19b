// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Event Bus
//!
//! In-memory pub/sub for hub domain events over tokio broadcast channels.
//! Subscribers include the CLI (live status display) and diagnostics.
//! Events are in-memory only and lost on restart.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::events::{InvocationEvent, RegistryEvent, ServerEvent};

/// Unified event type carried by the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HubEvent {
    Registry(RegistryEvent),
    Server(ServerEvent),
    Invocation(InvocationEvent),
}

/// Event bus for publishing and subscribing to hub events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<HubEvent>>,
}

impl EventBus {
    /// Capacity bounds how many events buffer before old ones drop.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_registry_event(&self, event: RegistryEvent) {
        self.publish(HubEvent::Registry(event));
    }

    pub fn publish_server_event(&self, event: ServerEvent) {
        self.publish(HubEvent::Server(event));
    }

    pub fn publish_invocation_event(&self, event: InvocationEvent) {
        self.publish(HubEvent::Invocation(event));
    }

    fn publish(&self, event: HubEvent) {
        // send() fails only when no receiver is subscribed; that is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe filtered to one server's lifecycle events.
    pub fn subscribe_server(&self, server_id: impl Into<String>) -> ServerEventReceiver {
        ServerEventReceiver {
            receiver: self.sender.subscribe(),
            server_id: server_id.into(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all hub events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<HubEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<HubEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<HubEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one server id.
pub struct ServerEventReceiver {
    receiver: broadcast::Receiver<HubEvent>,
    server_id: String,
}

impl ServerEventReceiver {
    pub async fn recv(&mut self) -> Result<ServerEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => EventBusError::Lagged(n),
            })?;

            if let HubEvent::Server(server_event) = event {
                if self.matches(&server_event) {
                    return Ok(server_event);
                }
            }
        }
    }

    fn matches(&self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::StatusChanged { server_id, .. }
            | ServerEvent::ToolsDiscovered { server_id, .. }
            | ServerEvent::ReconnectScheduled { server_id, .. } => server_id == &self.server_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,

    #[error("no events available")]
    Empty,

    #[error("receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
