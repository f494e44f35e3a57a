//! The Cartloop commerce agent.
//!
//! One processing cycle looks like this:
//!
//! 1. **Receive** a customer message and start a session if none is active
//! 2. **Short-circuit** goodbyes: reply with a closing text and conclude
//! 3. **Ask the oracle** with the system prompt and recent conversation
//! 4. **If tool calls**: execute them, append observations, check for
//!    two tools alternating, loop back to step 3
//! 5. **If text**: clean it up, attach the payment link, return it
//!
//! Every cycle and tool call is reported to an observability sink on a
//! best-effort basis.

pub mod agent;
pub mod cycle;
pub mod error;
pub mod intent;
pub mod loop_runner;
pub mod postprocess;
pub mod recorder;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use agent::{AgentResponse, CLOSING_MESSAGE, CommerceAgent, PURCHASE_NUDGE, ResponseData, SessionStatus};
pub use cycle::CycleDetector;
pub use error::{CircularToolError, ErrorKind, LoopError};
pub use loop_runner::{DEFAULT_SYSTEM_PROMPT, FinalAnswer, LoopOutcome, ToolLoop};
pub use recorder::{ActiveTrace, SinkRecorder};
pub use session::{AgentMessage, AgentMetrics, SessionContext, SessionMetrics, TurnRole};
