//! Conversation turn types.
//!
//! These are the value objects the state container keeps in `messages` and
//! hands to the model on every iteration:
//! system instruction → user task → assistant turns ⇄ tool results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ToolError;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (or the delegating agent)
    User,
    /// The AI assistant
    Assistant,
    /// Standing instructions
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// If this is a tool result, the name of the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (e.g. marks a summarization digest)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(name.into());
        msg
    }

    /// Attach tool calls to an (assistant) message.
    pub fn with_tool_calls(mut self, tool_calls: Vec<MessageToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments, either already structured or as a serialized JSON string
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl MessageToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Resolve the arguments into a JSON object.
    ///
    /// Accepts a structured object, a serialized JSON string, or nothing
    /// (`null` / blank string) which maps to an empty object.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, ToolError> {
        let parsed = match &self.arguments {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            serde_json::Value::String(raw) if raw.trim().is_empty() => {
                serde_json::Value::Object(serde_json::Map::new())
            }
            serde_json::Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
                ToolError::InvalidArguments(format!(
                    "arguments for '{}' are not valid JSON: {e}",
                    self.name
                ))
            })?,
            other => other.clone(),
        };

        if !parsed.is_object() {
            return Err(ToolError::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object",
                self.name
            )));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_result_carries_call_id_and_name() {
        let msg = Message::tool_result("call_1", "write_todos", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("write_todos"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::system("rules");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn parse_structured_arguments() {
        let call = MessageToolCall::new("c1", "task", json!({"description": "x"}));
        assert_eq!(call.parse_arguments().unwrap()["description"], "x");
    }

    #[test]
    fn parse_string_arguments() {
        let call = MessageToolCall::new("c1", "task", json!(r#"{"subagent_type": "general-purpose"}"#));
        assert_eq!(
            call.parse_arguments().unwrap()["subagent_type"],
            "general-purpose"
        );
    }

    #[test]
    fn blank_arguments_are_empty_object() {
        let call = MessageToolCall::new("c1", "completion", json!(""));
        assert_eq!(call.parse_arguments().unwrap(), json!({}));
        let call = MessageToolCall::new("c1", "completion", serde_json::Value::Null);
        assert_eq!(call.parse_arguments().unwrap(), json!({}));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let call = MessageToolCall::new("c1", "task", json!("{not json"));
        let err = call.parse_arguments().unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let call = MessageToolCall::new("c1", "task", json!([1, 2]));
        assert!(call.parse_arguments().is_err());
    }
}
