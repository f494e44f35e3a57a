//! The caller-facing commerce agent.
//!
//! Owns one conversation's session and drives it through
//! `NoSession → Active → Concluded`. Conclusion (sink conclude and flush)
//! happens at most once per session.

use crate::error::LoopError;
use crate::intent;
use crate::loop_runner::ToolLoop;
use crate::recorder::SinkRecorder;
use crate::session::{AgentMessage, AgentMetrics, SessionContext, SessionMetrics};
use cartloop_config::AppConfig;
use cartloop_core::event::{DomainEvent, EventBus};
use cartloop_core::step::{ToolInvocationStep, distinct_tool_names};
use cartloop_telemetry::ObservabilitySink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub const CLOSING_MESSAGE: &str = "Thank you for shopping with us! This conversation is now closed. \
Send another message any time to start a new one.";

pub const PURCHASE_NUDGE: &str = "Tell me which product and how many you'd like, \
and I'll create a secure payment link for you.";

/// What a caller gets back for every message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    pub session_id: String,
    pub tools_used: Vec<String>,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    pub session_ended: bool,
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub active: bool,
    pub session_id: Option<String>,
    pub name: Option<String>,
    pub message_count: usize,
    pub tools_used: Vec<String>,
    pub metrics: SessionMetrics,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// One customer's conversation with the sales agent.
///
/// Holds at most one session at a time. Each call to
/// [`process_message`](Self::process_message) is one processing cycle: a
/// trace on the observability sink, a run of the [`ToolLoop`], and one
/// user/assistant exchange folded into the session.
pub struct CommerceAgent {
    /// Runs the oracle and tools for each cycle.
    tool_loop: ToolLoop,

    /// Best-effort reporting to the observability sink.
    recorder: SinkRecorder,

    /// Session lifecycle events; shared with the tool loop.
    event_bus: Arc<EventBus>,

    /// `None` until the first session; an inactive value once concluded.
    session: Option<SessionContext>,

    /// Turns of history sent to the oracle as context.
    history_window: usize,
}

impl CommerceAgent {
    /// An agent with a private event bus, a 6-turn history window and a
    /// 20 s sink timeout.
    pub fn new(tool_loop: ToolLoop, sink: Arc<dyn ObservabilitySink>) -> Self {
        let event_bus = Arc::new(EventBus::default());
        Self {
            tool_loop: tool_loop.with_event_bus(event_bus.clone()),
            recorder: SinkRecorder::new(sink, Duration::from_secs(20)),
            event_bus,
            session: None,
            history_window: 6,
        }
    }

    /// Wire an agent from config. The event bus is shared with the loop.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn cartloop_core::Provider>,
        tools: cartloop_core::ToolRegistry,
        sink: Arc<dyn ObservabilitySink>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let tool_loop = ToolLoop::from_config(provider, Arc::new(tools), config);
        Self::new(tool_loop, sink)
            .with_event_bus(event_bus)
            .with_history_window(config.agent.history_window)
            .with_sink_timeout(Duration::from_secs(config.telemetry.flush_timeout_secs))
    }

    /// Share `bus` with the tool loop so tool events land on it too.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.tool_loop = self.tool_loop.with_event_bus(bus.clone());
        self.event_bus = bus;
        self
    }

    /// Number of recent turns rendered into the oracle's context (at least 1).
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    /// Bound on every observability sink call, flush included.
    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.recorder = SinkRecorder::new(self.recorder.sink(), timeout);
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    fn active_session(&self) -> Option<&SessionContext> {
        self.session.as_ref().filter(|s| s.is_active)
    }

    /// Begin a new session, concluding the current one first.
    pub async fn start_session(&mut self, name: Option<&str>) -> String {
        self.conclude_active().await;

        let session = SessionContext::new(name.map(str::to_string));
        let id = session.session_id.clone();
        self.recorder.start_session(&id, name).await;
        self.event_bus.publish(DomainEvent::SessionStarted {
            session_id: id.clone(),
            name: session.name.clone(),
            timestamp: Utc::now(),
        });
        info!(session_id = %id, name = ?name, "Session started");
        self.session = Some(session);
        id
    }

    /// Conclude the active session, if any.
    pub async fn end_conversation(&mut self) {
        self.conclude_active().await;
    }

    /// Conclude the active session and start a fresh one.
    pub async fn restart_conversation(&mut self) {
        self.start_session(None).await;
    }

    /// Snapshot of the current session, or an inactive empty status before
    /// the first one.
    pub fn session_status(&self) -> SessionStatus {
        match &self.session {
            None => SessionStatus {
                active: false,
                session_id: None,
                name: None,
                message_count: 0,
                tools_used: Vec::new(),
                metrics: SessionMetrics::default(),
                started_at: None,
                last_activity: None,
            },
            Some(s) => SessionStatus {
                active: s.is_active,
                session_id: Some(s.session_id.clone()),
                name: s.name.clone(),
                message_count: s.message_count,
                tools_used: s.tools_used.iter().cloned().collect(),
                metrics: s.metrics.clone(),
                started_at: Some(s.start_time),
                last_activity: Some(s.last_activity),
            },
        }
    }

    /// Turns of the current (or last concluded) session, oldest first.
    pub fn conversation_history(&self) -> &[AgentMessage] {
        self.session
            .as_ref()
            .map(|s| s.conversation_history.as_slice())
            .unwrap_or_default()
    }

    /// Forget the active session's turns. Metrics are kept.
    pub fn clear_conversation_history(&mut self) {
        if let Some(session) = self.session.take() {
            self.session = Some(session.clear_history());
        }
    }

    /// Process one customer message. Never fails: every error becomes a
    /// polite `success: false` response and the session stays active.
    pub async fn process_message(&mut self, user_message: &str) -> AgentResponse {
        let started = Instant::now();
        let text = user_message.trim();
        if text.is_empty() {
            return AgentResponse {
                success: false,
                message: "Please type a message so I can help you.".into(),
                error: Some("empty message".into()),
                data: None,
            };
        }

        let session_id = self.ensure_active_session().await;

        if intent::is_ending_intent(text) {
            return self.close_with_goodbye(text, &session_id, started).await;
        }

        let context = self
            .active_session()
            .map(|s| s.render_context(self.history_window))
            .unwrap_or_default();

        let mut steps: Vec<ToolInvocationStep> = Vec::new();
        let trace = self.recorder.start_trace(&session_id, text).await;
        let result = self
            .tool_loop
            .run_with_steps(text, &context, &trace, &mut steps)
            .await;
        let execution_time_ms = started.elapsed().as_millis() as u64;
        let tools_used = distinct_tool_names(&steps);

        let (message, payment_link, error) = match result {
            Ok(answer) => {
                let mut message = answer.output;
                if answer.payment_link.is_none() && intent::has_purchase_intent(text) {
                    message = format!("{message}\n\n{PURCHASE_NUDGE}");
                }
                (message, answer.payment_link, None)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, kind = ?e.kind(), "Processing failed");
                (e.user_message(), None, Some(e))
            }
        };
        let success = error.is_none();
        trace.conclude(&message, success).await;

        let metrics = AgentMetrics {
            execution_time_ms,
            success,
            tools_used: tools_used.clone(),
            error_type: error.as_ref().map(LoopError::kind),
        };
        self.apply(|s| s.record_exchange(text, &message).record_cycle(&metrics));

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            session_id: session_id.clone(),
            success,
            execution_time_ms,
            timestamp: Utc::now(),
        });
        info!(
            session_id = %session_id,
            success,
            execution_time_ms,
            tools = ?tools_used,
            "Message processed"
        );

        AgentResponse {
            success,
            message,
            error: error.map(|e| e.to_string()),
            data: Some(ResponseData {
                session_id,
                tools_used,
                execution_time_ms,
                payment_link,
                session_ended: false,
            }),
        }
    }

    /// The ending turn: record it, skip the oracle, and conclude.
    async fn close_with_goodbye(
        &mut self,
        text: &str,
        session_id: &str,
        started: Instant,
    ) -> AgentResponse {
        let execution_time_ms = started.elapsed().as_millis() as u64;
        let metrics = AgentMetrics {
            execution_time_ms,
            success: true,
            tools_used: Vec::new(),
            error_type: None,
        };
        self.apply(|s| s.record_exchange(text, CLOSING_MESSAGE).record_cycle(&metrics));
        self.conclude_active().await;

        AgentResponse {
            success: true,
            message: CLOSING_MESSAGE.to_string(),
            error: None,
            data: Some(ResponseData {
                session_id: session_id.to_string(),
                tools_used: Vec::new(),
                execution_time_ms,
                payment_link: None,
                session_ended: true,
            }),
        }
    }

    /// Start a session unless one is active. A concluded session is
    /// replaced transparently.
    async fn ensure_active_session(&mut self) -> String {
        match self.active_session() {
            Some(s) => s.session_id.clone(),
            None => self.start_session(None).await,
        }
    }

    fn apply(&mut self, transition: impl FnOnce(SessionContext) -> SessionContext) {
        if let Some(session) = self.session.take() {
            self.session = Some(transition(session));
        }
    }

    /// Active → Concluded. A no-op unless a session is active, so the sink
    /// sees conclude and flush exactly once per session.
    async fn conclude_active(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if !session.is_active {
            self.session = Some(session);
            return;
        }

        let session = session.conclude();
        let id = session.session_id.clone();
        let message_count = session.message_count;
        self.session = Some(session);

        self.recorder.conclude_session(&id).await;
        self.recorder.flush().await;
        self.event_bus.publish(DomainEvent::SessionConcluded {
            session_id: id.clone(),
            message_count,
            timestamp: Utc::now(),
        });
        info!(session_id = %id, message_count, "Session concluded");
    }
}
