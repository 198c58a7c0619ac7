//! Planning tool. The model calls `write_todos` with the full list of tasks;
//! the planning middleware intercepts the call, records the plan in state and
//! supplies the real result. Executed directly, it is a no-op.

use async_trait::async_trait;
use deepclaw_core::error::ToolError;
use deepclaw_core::tool::{Tool, ToolResult};

pub const WRITE_TODOS_TOOL: &str = "write_todos";

const DESCRIPTION: &str = "\
Create or update a structured task list for the current work session. \
Send the complete list every time; it replaces the previous one.

Use it for tasks that need three or more distinct steps, when the user gives \
several tasks at once, or when the plan may change as results come in. Skip it \
for single, trivial or purely conversational requests.

Task states:
- pending: not started yet
- in_progress: being worked on now (mark the first task in_progress as soon as you write the list)
- completed: fully done, with no unresolved errors

Mark tasks completed immediately after finishing them. Keep a blocked task \
in_progress and add a new task describing what must be resolved. Remove tasks \
that are no longer relevant. Pass back the id of a task you are updating.";

pub struct WriteTodosTool;

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &str {
        WRITE_TODOS_TOOL
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "List of tasks to be done",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": {
                                "type": "string",
                                "description": "What needs to be done"
                            },
                            "activeForm": {
                                "type": "string",
                                "description": "Present continuous form (e.g., 'Analyzing code')"
                            },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"],
                                "description": "Task status"
                            },
                            "id": {
                                "type": "string",
                                "description": "Task ID (optional, for updates)"
                            }
                        },
                        "required": ["content", "activeForm", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::structured(
            true,
            "ok",
            serde_json::json!({ "success": true }),
        ))
    }
}
