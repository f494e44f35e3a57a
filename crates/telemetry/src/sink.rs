//! The observability sink seen by the agent.

use crate::SinkError;
use crate::model::Span;
use async_trait::async_trait;

/// Receives session, trace, and span events from the agent.
///
/// Every call may fail; callers treat failures as non-fatal.
#[async_trait]
pub trait ObservabilitySink: Send + Sync {
    async fn start_session(&self, session_id: &str, name: Option<&str>) -> Result<(), SinkError>;

    /// Open a trace for one processing cycle. Returns the trace id.
    async fn start_trace(&self, session_id: &str, input: &str) -> Result<String, SinkError>;

    async fn add_llm_span(&self, trace_id: &str, span: Span) -> Result<(), SinkError>;

    async fn add_tool_span(&self, trace_id: &str, span: Span) -> Result<(), SinkError>;

    async fn conclude_trace(
        &self,
        trace_id: &str,
        output: &str,
        success: bool,
    ) -> Result<(), SinkError>;

    async fn conclude_session(&self, session_id: &str) -> Result<(), SinkError>;

    /// Push everything buffered to the backend.
    async fn flush(&self) -> Result<(), SinkError>;
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl ObservabilitySink for NoopSink {
    async fn start_session(&self, _session_id: &str, _name: Option<&str>) -> Result<(), SinkError> {
        Ok(())
    }

    async fn start_trace(&self, _session_id: &str, _input: &str) -> Result<String, SinkError> {
        Ok(String::new())
    }

    async fn add_llm_span(&self, _trace_id: &str, _span: Span) -> Result<(), SinkError> {
        Ok(())
    }

    async fn add_tool_span(&self, _trace_id: &str, _span: Span) -> Result<(), SinkError> {
        Ok(())
    }

    async fn conclude_trace(
        &self,
        _trace_id: &str,
        _output: &str,
        _success: bool,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    async fn conclude_session(&self, _session_id: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
