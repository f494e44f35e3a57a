//! Best-effort bridge from the agent to its observability sink.
//!
//! Every sink call is bounded by a timeout. Failures are logged and
//! swallowed; the conversation never waits on a broken sink.

use cartloop_telemetry::{ObservabilitySink, SinkError, Span};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct SinkRecorder {
    sink: Arc<dyn ObservabilitySink>,
    timeout: Duration,
}

impl SinkRecorder {
    pub fn new(sink: Arc<dyn ObservabilitySink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    pub fn sink(&self) -> Arc<dyn ObservabilitySink> {
        self.sink.clone()
    }

    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, SinkError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(operation, error = %e, "Observability sink call failed");
                None
            }
            Err(_) => {
                let e = SinkError::Timeout(self.timeout.as_secs());
                warn!(operation, error = %e, "Observability sink call failed");
                None
            }
        }
    }

    pub async fn start_session(&self, session_id: &str, name: Option<&str>) {
        self.guarded("start_session", self.sink.start_session(session_id, name))
            .await;
    }

    /// Open a trace for one processing cycle.
    pub async fn start_trace(&self, session_id: &str, input: &str) -> ActiveTrace<'_> {
        let trace_id = self
            .guarded("start_trace", self.sink.start_trace(session_id, input))
            .await;
        ActiveTrace {
            recorder: self,
            trace_id,
        }
    }

    pub async fn conclude_session(&self, session_id: &str) {
        self.guarded("conclude_session", self.sink.conclude_session(session_id))
            .await;
    }

    pub async fn flush(&self) {
        self.guarded("flush", self.sink.flush()).await;
    }
}

/// A trace that may or may not exist on the sink side. Spans for a trace
/// the sink refused to open are dropped.
pub struct ActiveTrace<'a> {
    recorder: &'a SinkRecorder,
    trace_id: Option<String>,
}

impl ActiveTrace<'_> {
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub async fn llm_span(&self, span: Span) {
        if let Some(id) = &self.trace_id {
            let sink = &self.recorder.sink;
            self.recorder
                .guarded("add_llm_span", sink.add_llm_span(id, span))
                .await;
        }
    }

    pub async fn tool_span(&self, span: Span) {
        if let Some(id) = &self.trace_id {
            let sink = &self.recorder.sink;
            self.recorder
                .guarded("add_tool_span", sink.add_tool_span(id, span))
                .await;
        }
    }

    pub async fn conclude(self, output: &str, success: bool) {
        if let Some(id) = &self.trace_id {
            let sink = &self.recorder.sink;
            self.recorder
                .guarded("conclude_trace", sink.conclude_trace(id, output, success))
                .await;
        }
    }
}
