//! The tool-call loop: ask the oracle, run the tools it names, feed the
//! observations back, until it answers in plain text.

use crate::cycle::CycleDetector;
use crate::error::LoopError;
use crate::postprocess;
use crate::recorder::ActiveTrace;
use cartloop_config::AppConfig;
use cartloop_core::event::{DomainEvent, EventBus};
use cartloop_core::message::{Message, MessageToolCall};
use cartloop_core::provider::{Provider, ProviderRequest, Usage};
use cartloop_core::step::ToolInvocationStep;
use cartloop_core::tool::{ToolCall, ToolRegistry};
use cartloop_core::error::ToolError;
use cartloop_telemetry::Span;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly sales assistant for an online store. \
Use the tools to look up products and prices and to create payment links. \
When the customer wants to buy something, create a payment link for it. \
Never invent products, prices, or links.";

/// Result of a cycle that ended with a final answer.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Post-processed reply text.
    pub output: String,
    pub steps: Vec<ToolInvocationStep>,
    /// Oracle calls made.
    pub iterations: u32,
    pub usage: Usage,
    pub payment_link: Option<String>,
}

/// Final answer without the step list, for callers that own the steps.
#[derive(Debug, Clone)]
pub struct FinalAnswer {
    pub output: String,
    pub iterations: u32,
    pub usage: Usage,
    pub payment_link: Option<String>,
}

/// The oracle/tool loop for one processing cycle.
///
/// Each iteration sends the transcript to the oracle. Requested tools run
/// one at a time and their observations are appended; a reply without tool
/// calls ends the cycle. Stateless between runs; one instance serves many
/// cycles.
pub struct ToolLoop {
    /// The LLM oracle.
    provider: Arc<dyn Provider>,

    /// Tools the oracle may call, looked up by name.
    tools: Arc<ToolRegistry>,

    /// Model identifier sent with every request.
    model: String,

    /// Sampling temperature.
    temperature: f32,

    /// Cap on completion tokens per oracle call, if any.
    max_tokens: Option<u32>,

    /// First message of every transcript.
    system_prompt: String,

    /// Maximum oracle calls per cycle.
    max_iterations: u32,

    /// Bound on each oracle call and each tool execution.
    call_timeout: Duration,

    /// Receives `ToolExecuted` and `CycleDetected` events when set.
    event_bus: Option<Arc<EventBus>>,
}

impl ToolLoop {
    /// A loop with temperature 0.2, 8 iterations, a 30 s call timeout and
    /// the default system prompt.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 8,
            call_timeout: Duration::from_secs(30),
            event_bus: None,
        }
    }

    /// Model, sampling, and agent limits from config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let mut tool_loop = Self::new(provider, tools, &config.default_model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_call_timeout(Duration::from_secs(config.agent.call_timeout_secs));
        if let Some(prompt) = &config.agent.system_prompt {
            tool_loop = tool_loop.with_system_prompt(prompt);
        }
        tool_loop
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap completion tokens per oracle call.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Replace [`DEFAULT_SYSTEM_PROMPT`].
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Cap on oracle calls per cycle.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Bound on each oracle call and each tool execution.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Publish tool and cycle events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    fn initial_messages(&self, user_message: &str, conversation_context: &str) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        if !conversation_context.trim().is_empty() {
            messages.push(Message::system(format!(
                "Recent conversation:\n{conversation_context}"
            )));
        }
        messages.push(Message::user(user_message));
        messages
    }

    /// Run one processing cycle.
    pub async fn run(
        &self,
        user_message: &str,
        conversation_context: &str,
        trace: &ActiveTrace<'_>,
    ) -> Result<LoopOutcome, LoopError> {
        let mut steps = Vec::new();
        let answer = self
            .run_with_steps(user_message, conversation_context, trace, &mut steps)
            .await?;
        Ok(LoopOutcome {
            output: answer.output,
            steps,
            iterations: answer.iterations,
            usage: answer.usage,
            payment_link: answer.payment_link,
        })
    }

    /// Like [`run`](Self::run), but steps are appended to `steps` so they
    /// survive a failed cycle.
    pub async fn run_with_steps(
        &self,
        user_message: &str,
        conversation_context: &str,
        trace: &ActiveTrace<'_>,
        steps: &mut Vec<ToolInvocationStep>,
    ) -> Result<FinalAnswer, LoopError> {
        let mut messages = self.initial_messages(user_message, conversation_context);
        let definitions = self.tools.definitions();
        let mut usage = Usage::default();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, max = self.max_iterations, "Tool loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
            };

            let started = Instant::now();
            let outcome = tokio::time::timeout(self.call_timeout, self.provider.complete(request)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    trace.llm_span(Span::llm_call(&self.model, elapsed_ms, false)).await;
                    warn!(error = %e, iteration, "Oracle call failed");
                    return Err(LoopError::Provider(e));
                }
                Err(_) => {
                    trace.llm_span(Span::llm_call(&self.model, elapsed_ms, false)).await;
                    warn!(timeout_secs = self.call_timeout.as_secs(), iteration, "Oracle call timed out");
                    return Err(LoopError::Timeout {
                        timeout_secs: self.call_timeout.as_secs(),
                    });
                }
            };

            let mut span = Span::llm_call(&response.model, elapsed_ms, true)
                .with_output(&response.message.content);
            if let Some(u) = response.usage {
                usage = usage.add(u);
                span = span.with_tokens(u.prompt_tokens, u.completion_tokens);
            }
            trace.llm_span(span).await;

            if !response.message.requests_tools() {
                let payment_link = postprocess::extract_payment_link(steps);
                let output = postprocess::finalize(&response.message.content, payment_link.as_deref());
                info!(
                    iterations = iteration,
                    steps = steps.len(),
                    tokens = usage.total_tokens,
                    "Tool loop finished"
                );
                return Ok(FinalAnswer {
                    output,
                    iterations: iteration,
                    usage,
                    payment_link,
                });
            }

            let calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for call in &calls {
                let step = self.execute_tool(call, trace).await;
                messages.push(Message::tool_result(&call.id, &step.observation));
                steps.push(step);

                if let Err(cycle) = CycleDetector::check(steps) {
                    warn!(pattern = ?cycle.tool_pattern, "Circular tool usage, aborting cycle");
                    self.publish(DomainEvent::CycleDetected {
                        pattern: cycle.tool_pattern.clone(),
                        timestamp: Utc::now(),
                    });
                    return Err(cycle.into());
                }
            }
        }

        warn!(max_iterations = self.max_iterations, steps = steps.len(), "Tool loop exhausted");
        Err(LoopError::IterationExhausted {
            max_iterations: self.max_iterations,
        })
    }

    /// Execute one requested tool. Every failure becomes an `Error: ...`
    /// observation.
    async fn execute_tool(&self, call: &MessageToolCall, trace: &ActiveTrace<'_>) -> ToolInvocationStep {
        let started = Instant::now();

        let (input, observation, success) = match serde_json::from_str::<serde_json::Value>(
            if call.arguments.trim().is_empty() { "{}" } else { &call.arguments },
        ) {
            Err(e) => {
                let err = ToolError::InvalidArguments(format!("{} received malformed JSON: {e}", call.name));
                (
                    serde_json::Value::String(call.arguments.clone()),
                    format!("Error: {err}"),
                    false,
                )
            }
            Ok(arguments) => {
                let tool_call = ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: arguments.clone(),
                };
                let (observation, success) =
                    match tokio::time::timeout(self.call_timeout, self.tools.execute(&tool_call)).await {
                        Ok(Ok(result)) => (result.output, result.success),
                        Ok(Err(e)) => (format!("Error: {e}"), false),
                        Err(_) => {
                            let err = ToolError::Timeout {
                                tool_name: call.name.clone(),
                                timeout_secs: self.call_timeout.as_secs(),
                            };
                            (format!("Error: {err}"), false)
                        }
                    };
                (arguments, observation, success)
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        if success {
            debug!(tool = %call.name, duration_ms, "Tool executed");
        } else {
            warn!(tool = %call.name, duration_ms, observation = %observation, "Tool failed");
        }

        self.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
        trace
            .tool_span(Span::tool_execution(
                &call.name,
                input.clone(),
                &observation,
                duration_ms,
                success,
            ))
            .await;

        ToolInvocationStep {
            tool_name: call.name.clone(),
            tool_input: input,
            observation,
            success,
            duration_ms,
        }
    }
}
