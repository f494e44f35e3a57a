//! Session state as immutable values.
//!
//! Each transition consumes the current [`SessionContext`] and returns the
//! next one. A concluded context is frozen: every transition returns it
//! unchanged.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one processing cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub execution_time_ms: u64,
    pub success: bool,
    pub tools_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_execution_time_ms: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub average_response_time_ms: f64,
}

impl SessionMetrics {
    pub fn operations(&self) -> u64 {
        self.successful_operations + self.failed_operations
    }

    fn record(mut self, execution_time_ms: u64, success: bool) -> Self {
        self.total_execution_time_ms += execution_time_ms;
        if success {
            self.successful_operations += 1;
        } else {
            self.failed_operations += 1;
        }
        self.average_response_time_ms =
            self.total_execution_time_ms as f64 / self.operations() as f64;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub conversation_history: Vec<AgentMessage>,
    pub is_active: bool,
    pub message_count: usize,
    pub tools_used: BTreeSet<String>,
    pub metrics: SessionMetrics,
}

impl SessionContext {
    /// A fresh, active session with a random id.
    pub fn new(name: Option<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name)
    }

    pub fn with_id(session_id: impl Into<String>, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            name,
            start_time: now,
            last_activity: now,
            conversation_history: Vec::new(),
            is_active: true,
            message_count: 0,
            tools_used: BTreeSet::new(),
            metrics: SessionMetrics::default(),
        }
    }

    /// Append a user message and the assistant's reply.
    pub fn record_exchange(mut self, user: &str, assistant: &str) -> Self {
        if !self.is_active {
            return self;
        }
        self.conversation_history.push(AgentMessage::user(user));
        self.conversation_history.push(AgentMessage::assistant(assistant));
        self.message_count = self.conversation_history.len();
        self.last_activity = Utc::now();
        self
    }

    /// Fold one cycle's metrics into the session totals.
    pub fn record_cycle(mut self, cycle: &AgentMetrics) -> Self {
        if !self.is_active {
            return self;
        }
        self.metrics = self.metrics.record(cycle.execution_time_ms, cycle.success);
        self.tools_used.extend(cycle.tools_used.iter().cloned());
        self.last_activity = Utc::now();
        self
    }

    /// Drop the history. Metrics and tool usage are kept.
    pub fn clear_history(mut self) -> Self {
        if !self.is_active {
            return self;
        }
        self.conversation_history.clear();
        self.message_count = 0;
        self
    }

    pub fn conclude(mut self) -> Self {
        if self.is_active {
            self.is_active = false;
            self.last_activity = Utc::now();
        }
        self
    }

    /// The last `window` turns as plain text for the oracle.
    pub fn render_context(&self, window: usize) -> String {
        let skip = self.conversation_history.len().saturating_sub(window);
        self.conversation_history
            .iter()
            .skip(skip)
            .map(|m| match m.role {
                TurnRole::User => format!("User: {}", m.content),
                TurnRole::Assistant => format!("Assistant: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
