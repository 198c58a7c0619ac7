//! Agent-level streaming events.
//!
//! `AgentStreamEvent` is what [`StatefulAgent::run_stream`] pushes to its
//! caller while a task executes: model text as it arrives, one notice per
//! tool call, and a final summary.
//!
//! [`StatefulAgent::run_stream`]: crate::loop_runner::StatefulAgent::run_stream

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during streaming execution.
///
/// - `chunk`      : partial text from the model
/// - `tool_result`: a tool call finished (executed or vetoed)
/// - `tool_error` : a tool call failed before producing a result
/// - `done`       : the task execution ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// A tool call finished; `content` is what was recorded in the transcript.
    ToolResult {
        id: String,
        name: String,
        content: String,
    },

    /// A tool call failed (bad arguments or execution error).
    ToolError {
        id: String,
        name: String,
        message: String,
    },

    /// The loop stopped, either on completion or budget exhaustion.
    Done { iterations: u32, completed: bool },
}

impl AgentStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolResult { .. } => "tool_result",
            Self::ToolError { .. } => "tool_error",
            Self::Done { .. } => "done",
        }
    }

    /// The plain-text rendering of this event, as a text-only consumer
    /// would print it.
    pub fn as_text(&self) -> String {
        match self {
            Self::Chunk { content } => content.clone(),
            Self::ToolResult { name, content, .. } => format!("\n[Tool {name}: {content}]\n"),
            Self::ToolError { message, .. } => format!("\n[Tool Error: {message}]\n"),
            Self::Done { .. } => String::new(),
        }
    }
}
