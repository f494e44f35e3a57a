//! Data model for sessions, traces, and spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// An oracle completion call.
    LlmCall,
    /// A tool execution.
    ToolExecution,
    /// Top-level turn (user message → final response).
    Turn,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LlmCall => write!(f, "llm_call"),
            Self::ToolExecution => write!(f, "tool_execution"),
            Self::Turn => write!(f, "turn"),
        }
    }
}

/// A single traced execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    pub kind: SpanKind,
    /// Tool name or model name.
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Span {
    fn new(kind: SpanKind, label: impl Into<String>, duration_ms: u64, success: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            started_at: Utc::now() - chrono::Duration::milliseconds(duration_ms as i64),
            duration_ms,
            input_tokens: None,
            output_tokens: None,
            success,
            input: None,
            output: None,
        }
    }

    /// One oracle call.
    pub fn llm_call(model: impl Into<String>, duration_ms: u64, success: bool) -> Self {
        Self::new(SpanKind::LlmCall, model, duration_ms, success)
    }

    /// One tool execution with its input and observation.
    pub fn tool_execution(
        tool_name: impl Into<String>,
        input: serde_json::Value,
        output: impl Into<String>,
        duration_ms: u64,
        success: bool,
    ) -> Self {
        let mut span = Self::new(SpanKind::ToolExecution, tool_name, duration_ms, success);
        span.input = Some(input);
        span.output = Some(output.into());
        span
    }

    /// The whole processing cycle.
    pub fn turn(duration_ms: u64, success: bool) -> Self {
        Self::new(SpanKind::Turn, "turn", duration_ms, success)
    }

    pub fn with_tokens(mut self, input: u32, output: u32) -> Self {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Total tokens (input + output), or 0 if not recorded.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans of one processing cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub session_id: String,
    /// The user message that opened the cycle.
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub spans: Vec<Span>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trace {
    pub fn new(session_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            input: input.into(),
            output: None,
            success: None,
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_span(&mut self, span: Span) {
        self.spans.push(span);
    }

    /// Mark the trace as complete.
    pub fn end(&mut self, output: impl Into<String>, success: bool) {
        self.output = Some(output.into());
        self.success = Some(success);
        self.ended_at = Some(Utc::now());
    }

    pub fn total_tokens(&self) -> u32 {
        self.spans.iter().map(|s| s.total_tokens()).sum()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.spans.iter().map(|s| s.duration_ms).sum()
    }

    pub fn llm_call_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::LlmCall)
            .count()
    }

    pub fn tool_execution_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::ToolExecution)
            .count()
    }
}

// ── Session ───────────────────────────────────────────────────────────────

/// A logical session grouping many traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concluded_at: Option<DateTime<Utc>>,
    /// Traces concluded in this session so far.
    pub trace_count: usize,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            started_at: Utc::now(),
            concluded_at: None,
            trace_count: 0,
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded_at.is_some()
    }
}

/// What a flush hands to an exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBatch {
    pub project: String,
    pub sessions: Vec<SessionRecord>,
    pub traces: Vec<Trace>,
}

impl ExportBatch {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.traces.is_empty()
    }
}
