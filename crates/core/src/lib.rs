//! # deepclaw Core
//!
//! Domain types, capability traits, and error definitions for the deepclaw
//! agent runtime. Everything the execution loop talks to from the outside
//! (the model, the tools, the task tracker) is a trait here; the agent crate
//! only ever sees these abstractions.
//!
//! ## Layout
//!
//! - [`message`]: conversation turns
//! - [`provider`]: model invocation (complete or streamed)
//! - [`tool`]: tool execution and the registry the loop dispatches through
//! - [`task`]: external task tracking used by the planning middleware
//! - [`state`]: the mutable state container shared by loop and middleware
//! - [`event`]: domain events broadcast while an agent runs

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod state;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use state::{AgentState, StateUpdate, Todo, TodoStatus};
pub use task::{InMemoryTaskTracker, TaskRecord, TaskTracker};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
