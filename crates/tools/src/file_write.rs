//! File write tool: write files under a workspace directory.
//!
//! Registered as `write_file`, which is also a name the eviction middleware
//! mirrors into the virtual filesystem, so the model can read back what it
//! wrote without another tool call.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use deepclaw_core::error::ToolError;
use deepclaw_core::tool::{Tool, ToolResult};

const TOOL_NAME: &str = "write_file";

pub struct FileWriteTool {
    /// Every written path is resolved relative to this directory.
    root: PathBuf,
}

impl FileWriteTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a model-supplied path, refusing anything that leaves the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || relative.as_os_str().is_empty() {
            return Err(ToolError::PermissionDenied {
                tool_name: TOOL_NAME.into(),
                reason: format!("path '{path}' is outside the workspace"),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace. Creates the file if it doesn't exist, \
         overwrites if it does."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Workspace-relative file path"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let target = self.resolve(path)?;

        if let Some(parent) = target.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult {
                success: false,
                ..ToolResult::text(format!("Failed to create directory: {e}"))
            });
        }

        match tokio::fs::write(&target, content).await {
            Ok(()) => {
                tracing::debug!(path = %target.display(), bytes = content.len(), "File written");
                Ok(ToolResult::text(format!(
                    "Successfully wrote {} bytes to {path}",
                    content.len()
                )))
            }
            Err(e) => Ok(ToolResult {
                success: false,
                ..ToolResult::text(format!("Failed to write file: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = FileWriteTool::new("/tmp");
        assert_eq!(tool.name(), "write_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path", "content"]));
    }

    #[tokio::test]
    async fn write_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());
        let result = tool
            .execute(serde_json::json!({
                "path": "report.md",
                "content": "Hello from test!"
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("16 bytes"));
        let content = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
        assert_eq!(content, "Hello from test!");
    }

    #[tokio::test]
    async fn leading_slash_stays_inside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());
        let result = tool
            .execute(serde_json::json!({
                "path": "/notes/plan.txt",
                "content": "nested content"
            }))
            .await
            .unwrap();

        assert!(result.success);
        let written = dir.path().join("notes").join("plan.txt");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "nested content");
    }

    #[tokio::test]
    async fn missing_content_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());
        let result = tool.execute(serde_json::json!({ "path": "a.txt" })).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());
        let result = tool
            .execute(serde_json::json!({
                "path": "../../../etc/crontab",
                "content": "malicious"
            }))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
