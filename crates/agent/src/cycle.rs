//! Detection of two tools ping-ponging without progress.

use crate::error::CircularToolError;
use cartloop_core::step::ToolInvocationStep;

/// Inspects the trailing four steps of a processing cycle.
///
/// Only the strict `[A, B, A, B]` shape with `A != B` is flagged. A single
/// tool repeated, or longer cycles, pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleDetector;

impl CycleDetector {
    pub const WINDOW: usize = 4;

    pub fn check(steps: &[ToolInvocationStep]) -> Result<(), CircularToolError> {
        let Some(tail) = steps.len().checked_sub(Self::WINDOW).map(|start| &steps[start..]) else {
            return Ok(());
        };
        let [t1, t2, t3, t4] = [
            &tail[0].tool_name,
            &tail[1].tool_name,
            &tail[2].tool_name,
            &tail[3].tool_name,
        ];
        if t1 == t3 && t2 == t4 && t1 != t2 {
            return Err(CircularToolError::new(t1.as_str(), t2.as_str()));
        }
        Ok(())
    }
}
