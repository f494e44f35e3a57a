//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use cartloop_core::error::{ProviderError, ToolError};
use cartloop_core::message::{Message, MessageToolCall};
use cartloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use cartloop_core::tool::{Tool, ToolResult};
use cartloop_telemetry::{ObservabilitySink, SinkError, Span};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue. With
/// `repeat_last`, the final response is served forever.
pub struct SequentialMockProvider {
    responses: Vec<Result<ProviderResponse, ProviderError>>,
    repeat_last: bool,
    delay: Option<Duration>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: responses.into_iter().map(Ok).collect(),
            repeat_last: false,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// A provider that requests the same tool call on every iteration.
    pub fn always_tool(name: &str, args: serde_json::Value) -> Self {
        let mut provider = Self::new(vec![make_tool_call_response(
            vec![make_tool_call(name, args)],
            "",
        )]);
        provider.repeat_last = true;
        provider
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            responses: vec![Err(error)],
            repeat_last: true,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let index = if self.repeat_last {
            index.min(self.responses.len() - 1)
        } else {
            index
        };
        match self.responses.get(index) {
            Some(response) => response.clone(),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                self.responses.len()
            ),
        }
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls(thought, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// A tool that always answers with the same observation.
pub struct StaticTool {
    pub name: &'static str,
    pub output: String,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StaticTool {
    pub fn new(name: &'static str, output: impl Into<String>) -> Self {
        Self {
            name,
            output: output.into(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed observation"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ToolResult::ok(self.output.clone()))
    }
}

/// An observability sink that counts calls, optionally failing or stalling.
#[derive(Default)]
pub struct CountingSink {
    fail: bool,
    delay: Option<Duration>,
    sessions_started: AtomicUsize,
    traces: AtomicUsize,
    spans: AtomicUsize,
    traces_concluded: AtomicUsize,
    sessions_concluded: AtomicUsize,
    flushes: AtomicUsize,
    concluded_ids: Mutex<Vec<String>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    async fn hit(&self, counter: &AtomicUsize) -> Result<(), SinkError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            Err(SinkError::Export("sink offline".into()))
        } else {
            Ok(())
        }
    }

    pub fn sessions_started(&self) -> usize {
        self.sessions_started.load(Ordering::SeqCst)
    }

    pub fn traces(&self) -> usize {
        self.traces.load(Ordering::SeqCst)
    }

    pub fn spans(&self) -> usize {
        self.spans.load(Ordering::SeqCst)
    }

    pub fn traces_concluded(&self) -> usize {
        self.traces_concluded.load(Ordering::SeqCst)
    }

    pub fn sessions_concluded(&self) -> usize {
        self.sessions_concluded.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn concluded_ids(&self) -> Vec<String> {
        self.concluded_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObservabilitySink for CountingSink {
    async fn start_session(&self, _session_id: &str, _name: Option<&str>) -> Result<(), SinkError> {
        self.hit(&self.sessions_started).await
    }

    async fn start_trace(&self, _session_id: &str, _input: &str) -> Result<String, SinkError> {
        self.hit(&self.traces).await?;
        Ok(format!("trace-{}", self.traces()))
    }

    async fn add_llm_span(&self, _trace_id: &str, _span: Span) -> Result<(), SinkError> {
        self.hit(&self.spans).await
    }

    async fn add_tool_span(&self, _trace_id: &str, _span: Span) -> Result<(), SinkError> {
        self.hit(&self.spans).await
    }

    async fn conclude_trace(
        &self,
        _trace_id: &str,
        _output: &str,
        _success: bool,
    ) -> Result<(), SinkError> {
        self.hit(&self.traces_concluded).await
    }

    async fn conclude_session(&self, session_id: &str) -> Result<(), SinkError> {
        self.concluded_ids
            .lock()
            .unwrap()
            .push(session_id.to_string());
        self.hit(&self.sessions_concluded).await
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.hit(&self.flushes).await
    }
}
