//! Completion tool: the model calls it to declare the task finished.
//!
//! Executing it never fails. The loop recognizes the name and stops after the
//! current batch of tool calls.

use async_trait::async_trait;
use deepclaw_core::error::ToolError;
use deepclaw_core::tool::{Tool, ToolResult};
use serde::Deserialize;

pub const COMPLETION_TOOL: &str = "completion";

#[derive(Debug, Default, Deserialize)]
struct CompletionArgs {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

pub struct CompletionTool;

#[async_trait]
impl Tool for CompletionTool {
    fn name(&self) -> &str {
        COMPLETION_TOOL
    }

    fn description(&self) -> &str {
        "Mark the task as complete. Call this once every success criterion is met, \
         passing the final result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "result": {
                    "type": "string",
                    "description": "The final answer or outcome of the task"
                },
                "summary": {
                    "type": "string",
                    "description": "Short summary of what was done"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Why the task is considered complete"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        // Arguments are advisory; an unexpected shape still completes.
        let args: CompletionArgs = serde_json::from_value(arguments).unwrap_or_default();

        let output = args
            .result
            .or(args.summary)
            .or(args.reasoning)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Task completed".to_string());

        Ok(ToolResult::text(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_result_text() {
        let result = CompletionTool
            .execute(serde_json::json!({"result": "42", "summary": "computed"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "42");
    }

    #[tokio::test]
    async fn falls_back_to_summary_then_default() {
        let result = CompletionTool
            .execute(serde_json::json!({"summary": "all done"}))
            .await
            .unwrap();
        assert_eq!(result.output, "all done");

        let result = CompletionTool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result.output, "Task completed");
    }

    #[tokio::test]
    async fn tolerates_odd_argument_types() {
        let result = CompletionTool
            .execute(serde_json::json!({"result": 7}))
            .await
            .unwrap();
        assert!(result.success);
    }
}
