//! Failures of one processing cycle.

use cartloop_core::error::ProviderError;
use serde::{Deserialize, Serialize};

/// Two tools alternating `[A, B, A, B]` at the end of the step list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CircularToolError {
    pub message: String,
    pub tool_pattern: [String; 2],
}

impl CircularToolError {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        let (first, second) = (first.into(), second.into());
        Self {
            message: format!(
                "Circular tool usage detected: {first} and {second} are alternating without progress"
            ),
            tool_pattern: [first, second],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error(transparent)]
    CircularTool(#[from] CircularToolError),

    #[error("No final answer after {max_iterations} iterations")]
    IterationExhausted { max_iterations: u32 },

    #[error("Oracle error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Oracle call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification recorded in per-cycle metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CircularTool,
    IterationExhausted,
    Timeout,
    Provider,
    Internal,
}

impl LoopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircularTool(_) => ErrorKind::CircularTool,
            Self::IterationExhausted { .. } => ErrorKind::IterationExhausted,
            Self::Provider(ProviderError::Timeout(_)) | Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The polite text shown to the customer instead of the raw error.
    pub fn user_message(&self) -> String {
        match self {
            Self::CircularTool(e) => format!(
                "I'm sorry, I got stuck going back and forth between {} and {}. \
                 Could you rephrase your request or tell me a bit more about what you need?",
                e.tool_pattern[0], e.tool_pattern[1]
            ),
            Self::IterationExhausted { .. } => {
                "I'm sorry, I couldn't finish that request. Please try again, \
                 perhaps with a more specific question."
                    .into()
            }
            Self::Timeout { .. } | Self::Provider(ProviderError::Timeout(_)) => {
                "I'm sorry, that took longer than expected. Please try again in a moment.".into()
            }
            Self::Provider(_) | Self::Internal(_) => {
                "I'm sorry, something went wrong while processing your request. \
                 Please try again."
                    .into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_error_carries_pattern() {
        let err = CircularToolError::new("list_prices", "list_products");
        assert_eq!(err.tool_pattern, ["list_prices".to_string(), "list_products".to_string()]);
        assert!(err.to_string().contains("list_prices"));

        let loop_err: LoopError = err.into();
        assert_eq!(loop_err.kind(), ErrorKind::CircularTool);
        assert!(loop_err.user_message().contains("list_products"));
    }

    #[test]
    fn provider_timeouts_classify_as_timeout() {
        let err = LoopError::Provider(ProviderError::Timeout("read".into()));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        let err = LoopError::Provider(ProviderError::AuthenticationFailed("bad".into()));
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn user_messages_hide_internals() {
        let err = LoopError::Internal("mutex poisoned at line 42".into());
        assert!(!err.user_message().contains("mutex"));
        let err = LoopError::IterationExhausted { max_iterations: 8 };
        assert!(err.user_message().contains("try again"));
    }
}
