//! Planning middleware: owns the side effect of the `write_todos` tool.
//!
//! The model sends its whole plan on every call. Entries that carry an `id`
//! are status updates for tasks already known to the tracker; entries
//! without one are new tasks and get their identifier assigned here before
//! the list lands in `state.todos`. The tool itself never runs.

use std::sync::Arc;

use async_trait::async_trait;
use deepclaw_core::state::{AgentState, StateUpdate, Todo};
use deepclaw_core::task::TaskTracker;
use deepclaw_tools::WRITE_TODOS_TOOL;
use serde_json::json;
use tracing::{debug, warn};

use super::{Middleware, PendingToolCall};

const EMPTY_PLAN_ERROR: &str = "Empty todos array. You must create the plan yourself by \
analyzing the task and breaking it into specific steps. The write_todos tool only RECORDS \
your plan - it does not create the plan for you. Please call write_todos() with a complete \
list of todos that YOU created.";

const PLANNING_PROMPT: &str = "\
## `write_todos`

You have access to the `write_todos` tool to plan and track multi-step objectives. \
Use it when a task needs three or more distinct steps; skip it for simple requests. \
Mark a todo in_progress before starting it and completed as soon as it is done. \
Never call `write_todos` several times in parallel. Revise the list whenever new \
information changes the plan.";

pub struct PlanningMiddleware {
    tracker: Arc<dyn TaskTracker>,
}

impl PlanningMiddleware {
    pub fn new(tracker: Arc<dyn TaskTracker>) -> Self {
        Self { tracker }
    }

    /// Sync the submitted list with the tracker, assigning ids to new
    /// entries. Returns an error message if a new task can't be created.
    async fn reconcile(&self, todos: &mut [Todo]) -> Result<(), String> {
        for todo in todos.iter_mut() {
            if todo.active_form.is_empty() {
                todo.active_form = todo.content.clone();
            }

            match todo.id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => {
                    // Unknown ids are left as submitted; the list is still recorded.
                    if let Err(e) = self.tracker.set_status(id, todo.status).await {
                        debug!(task_id = %id, error = %e, "Todo status not synced");
                    }
                }
                None => {
                    let mut metadata = serde_json::Map::new();
                    metadata.insert("activeForm".into(), json!(todo.active_form));
                    let record = self
                        .tracker
                        .create(&todo.content, metadata)
                        .await
                        .map_err(|e| format!("Failed to record task '{}': {e}", todo.content))?;
                    todo.id = Some(record.id);
                }
            }
        }
        Ok(())
    }
}

fn summarize(todos: &[Todo]) -> String {
    let lines: Vec<String> = todos
        .iter()
        .map(|t| format!("- [{}] {}", t.status, t.content))
        .collect();
    format!(
        "Updated todo list ({} tasks):\n{}",
        todos.len(),
        lines.join("\n")
    )
}

#[async_trait]
impl Middleware for PlanningMiddleware {
    fn name(&self) -> &str {
        "planning"
    }

    fn system_prompt(&self) -> Option<String> {
        Some(PLANNING_PROMPT.to_string())
    }

    async fn before_tool(
        &self,
        call: &mut PendingToolCall,
        _state: &AgentState,
    ) -> Option<StateUpdate> {
        if call.name != WRITE_TODOS_TOOL {
            return None;
        }

        let raw = call
            .arguments
            .get("todos")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let is_empty = match &raw {
            serde_json::Value::Null => true,
            serde_json::Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if is_empty {
            debug!("Rejected empty plan");
            call.veto(json!({ "success": false, "error": EMPTY_PLAN_ERROR }));
            return None;
        }

        let mut todos: Vec<Todo> = match serde_json::from_value(raw) {
            Ok(todos) => todos,
            Err(e) => {
                call.veto(json!({
                    "success": false,
                    "error": format!("Invalid todos: {e}. Each todo needs content, activeForm and status."),
                }));
                return None;
            }
        };

        if let Err(message) = self.reconcile(&mut todos).await {
            warn!(error = %message, "Plan not recorded");
            call.veto(json!({ "success": false, "error": message }));
            return None;
        }

        call.veto(json!({
            "success": true,
            "todos_count": todos.len(),
            "result": summarize(&todos),
        }));
        debug!(count = todos.len(), "Plan recorded");

        Some(StateUpdate::todos(todos))
    }
}
