//! Domain event system: lets observers follow an agent run without
//! hooking into the middleware chain.
//!
//! Events are published by the execution loop. Subscribers that fall behind
//! lose the oldest events; nothing ever blocks the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model produced an assistant turn
    ResponseGenerated {
        agent: String,
        iteration: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool call finished (executed or vetoed by middleware)
    ToolExecuted {
        tool_name: String,
        success: bool,
        skipped: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A task execution ended
    RunFinished {
        agent: String,
        iterations: u32,
        completed: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
