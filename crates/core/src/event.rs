//! Domain event system: decoupled notifications about agent activity.
//!
//! The agent publishes events as sessions start and end and as tools run.
//! Front ends subscribe to show progress without coupling to the agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    SessionStarted {
        session_id: String,
        name: Option<String>,
        timestamp: DateTime<Utc>,
    },

    SessionConcluded {
        session_id: String,
        message_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The agent produced a reply for one processing cycle
    ResponseGenerated {
        session_id: String,
        success: bool,
        execution_time_ms: u64,
        timestamp: DateTime<Utc>,
    },

    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The loop was aborted because two tools kept alternating
    CycleDetected {
        pattern: [String; 2],
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
