//! # Cartloop Core
//!
//! Domain types, traits, and error definitions for the Cartloop commerce agent.
//! Every external collaborator (the LLM oracle, the tools that reach the
//! payment API) is described here as a trait; concrete adapters live in
//! their own crates.
//!
//! ## Layout
//!
//! - [`provider`]: the oracle abstraction (`Provider`) and request/response types
//! - [`tool`]: the `Tool` trait and the name-keyed `ToolRegistry`
//! - [`step`]: `ToolInvocationStep`, one (tool, input, observation) triple
//! - [`message`]: transcript messages exchanged with the oracle
//! - [`event`]: domain events broadcast on the `EventBus`

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use step::ToolInvocationStep;
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
