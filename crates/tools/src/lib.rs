//! Built-in tool implementations for deepclaw.
//!
//! Every agent gets the completion and planning tools by default. The file
//! writer is opt-in because it touches the real filesystem.

pub mod completion;
pub mod file_write;
pub mod write_todos;

use std::sync::Arc;

use deepclaw_core::tool::{Tool, ToolRegistry};

pub use completion::{COMPLETION_TOOL, CompletionTool};
pub use file_write::FileWriteTool;
pub use write_todos::{WRITE_TODOS_TOOL, WriteTodosTool};

/// The tools every agent carries unless configured otherwise.
pub fn default_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(CompletionTool), Arc::new(WriteTodosTool)]
}

/// Create a registry holding the default tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in default_tools() {
        registry.register(tool);
    }
    registry
}
