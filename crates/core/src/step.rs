//! One step of agent execution.

use serde::{Deserialize, Serialize};

/// A (tool, input, observation) triple produced inside a single processing
/// cycle. Steps are kept in execution order; the cycle detector relies on
/// positional adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationStep {
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub observation: String,
    /// Whether the tool reported success
    pub success: bool,
    pub duration_ms: u64,
}

impl ToolInvocationStep {
    pub fn new(
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_input,
            observation: observation.into(),
            success: true,
            duration_ms: 0,
        }
    }
}

/// Tool names in first-use order, without duplicates.
pub fn distinct_tool_names(steps: &[ToolInvocationStep]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for step in steps {
        if !names.iter().any(|n| n == &step.tool_name) {
            names.push(step.tool_name.clone());
        }
    }
    names
}
