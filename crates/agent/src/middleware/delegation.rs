//! Delegation: lets the agent hand a sub-task to an isolated sub-agent.
//!
//! The middleware contributes one tool, `task(description, subagent_type)`.
//! Sub-agents are built through a [`SubAgentFactory`] the first time their
//! type is requested and cached by type name afterwards. Whatever happens
//! inside the nested run, the tool answers with an envelope:
//! `{"success": true, "result": ...}` or `{"success": false, "error": ...}`.
//!
//! Delegation is gated on planning: until `todos` holds at least one entry,
//! every `task` call is vetoed with a refusal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use deepclaw_config::{GENERAL_PURPOSE_AGENT, SubAgentConfig};
use deepclaw_core::error::ToolError;
use deepclaw_core::state::{AgentState, StateUpdate};
use deepclaw_core::tool::{Tool, ToolResult};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Middleware, PendingToolCall};

pub const TASK_TOOL: &str = "task";

const GENERAL_PURPOSE_DESCRIPTION: &str = "General-purpose agent for researching complex \
questions, searching for content, and executing multi-step tasks. It has access to all \
tools of the main agent.";

const PLAN_REQUIRED_ERROR: &str = "Planning required before delegation. You MUST create a \
plan using write_todos before delegating tasks. Create the complete plan first, work \
through it step by step, and only then delegate subtasks that benefit from isolation.";

const DELEGATION_PROMPT: &str = "\
## `task` (sub-agent spawner)

You can launch short-lived sub-agents with the `task` tool. Each one handles a single \
isolated task and returns one result; you never see its intermediate steps.

Use it for complex, self-contained work whose details would bloat your own context, \
such as broad research that ends in a short report. Do not use it for trivial steps or \
when you need to follow the reasoning.

Planning comes first: call `write_todos` with your plan before any delegation. \
Delegation without a plan is refused.";

/// A sub-agent type the `task` tool can launch.
#[derive(Debug, Clone, PartialEq)]
pub struct SubAgentSpec {
    pub name: String,
    pub description: String,
    pub system_prompt: Option<String>,
    /// Parent tool names the sub-agent may use; all of them when `None`.
    pub tools: Option<Vec<String>>,
}

impl SubAgentSpec {
    /// The built-in general-purpose type, carrying `instruction` as its prompt.
    pub fn general_purpose(instruction: impl Into<String>) -> Self {
        Self {
            name: GENERAL_PURPOSE_AGENT.to_string(),
            description: GENERAL_PURPOSE_DESCRIPTION.to_string(),
            system_prompt: Some(instruction.into()),
            tools: None,
        }
    }

    /// Instruction the sub-agent runs with.
    pub fn instruction(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(&self.description)
    }
}

impl From<&SubAgentConfig> for SubAgentSpec {
    fn from(config: &SubAgentConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            system_prompt: config.system_prompt.clone(),
            tools: config.tools.clone(),
        }
    }
}

/// A runnable agent that performs one delegated task per call.
#[async_trait]
pub trait SubAgent: Send {
    async fn run_task(&mut self, task: &str) -> deepclaw_core::Result<String>;
}

/// Produces a fully configured sub-agent for a spec.
pub trait SubAgentFactory: Send + Sync {
    fn build(&self, spec: &SubAgentSpec) -> deepclaw_core::Result<Box<dyn SubAgent>>;
}

struct Delegator {
    factory: Arc<dyn SubAgentFactory>,
    specs: Vec<SubAgentSpec>,
    agents: Mutex<HashMap<String, Box<dyn SubAgent>>>,
}

impl Delegator {
    fn available(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    async fn run(&self, description: &str, subagent_type: &str) -> serde_json::Value {
        let mut agents = self.agents.lock().await;

        if !agents.contains_key(subagent_type) {
            let Some(spec) = self.specs.iter().find(|s| s.name == subagent_type) else {
                return json!({
                    "success": false,
                    "error": format!(
                        "Subagent type '{subagent_type}' not found. Available: {}",
                        self.available().join(", ")
                    ),
                });
            };
            match self.factory.build(spec) {
                Ok(agent) => {
                    debug!(subagent = %subagent_type, "Built sub-agent");
                    agents.insert(subagent_type.to_string(), agent);
                }
                Err(e) => {
                    warn!(subagent = %subagent_type, error = %e, "Sub-agent construction failed");
                    return json!({ "success": false, "error": e.to_string() });
                }
            }
        }

        let Some(agent) = agents.get_mut(subagent_type) else {
            return json!({ "success": false, "error": format!("Subagent '{subagent_type}' unavailable") });
        };

        let preview: String = description.chars().take(100).collect();
        info!(subagent = %subagent_type, task = %preview, "Running sub-agent");

        match agent.run_task(description).await {
            Ok(output) => json!({ "success": true, "result": output }),
            Err(e) => {
                warn!(subagent = %subagent_type, error = %e, "Sub-agent failed");
                json!({ "success": false, "error": e.to_string() })
            }
        }
    }
}

/// The `task` tool. Its description lists the known sub-agent types.
pub struct TaskTool {
    delegator: Arc<Delegator>,
    description: String,
}

impl TaskTool {
    fn new(delegator: Arc<Delegator>) -> Self {
        let agents: Vec<String> = delegator
            .specs
            .iter()
            .map(|s| format!("- {}: {}", s.name, s.description))
            .collect();
        let description = format!(
            "Launch an ephemeral sub-agent to handle a complex, independent task in an \
             isolated context.\n\nAvailable agent types:\n{}\n\nSpecify the agent type in \
             `subagent_type`. Each invocation is stateless: put everything the sub-agent \
             needs, including what it should return, in `description`. Only its final \
             result comes back to you.",
            agents.join("\n")
        );
        Self {
            delegator,
            description,
        }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        TASK_TOOL
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "Detailed task description for the sub-agent, including what to return"
                },
                "subagent_type": {
                    "type": "string",
                    "description": "Type of sub-agent to use (e.g. 'general-purpose')"
                }
            },
            "required": ["description", "subagent_type"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let description = arguments["description"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'description' argument".into()))?;
        let subagent_type = arguments["subagent_type"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments("Missing 'subagent_type' argument".into())
        })?;

        let envelope = self.delegator.run(description, subagent_type).await;
        let success = envelope["success"].as_bool().unwrap_or(false);
        let output = match (&envelope["result"], &envelope["error"]) {
            (serde_json::Value::String(r), _) => r.clone(),
            (_, serde_json::Value::String(e)) => e.clone(),
            _ => envelope.to_string(),
        };
        Ok(ToolResult::structured(success, output, envelope))
    }
}

pub struct DelegationMiddleware {
    delegator: Arc<Delegator>,
}

impl DelegationMiddleware {
    /// `specs` lists every launchable type, general-purpose included if wanted.
    pub fn new(factory: Arc<dyn SubAgentFactory>, specs: Vec<SubAgentSpec>) -> Self {
        Self {
            delegator: Arc::new(Delegator {
                factory,
                specs,
                agents: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Names of the sub-agent types on offer.
    pub fn available(&self) -> Vec<&str> {
        self.delegator.available()
    }
}

#[async_trait]
impl Middleware for DelegationMiddleware {
    fn name(&self) -> &str {
        "delegation"
    }

    fn system_prompt(&self) -> Option<String> {
        Some(DELEGATION_PROMPT.to_string())
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(TaskTool::new(self.delegator.clone()))]
    }

    async fn before_tool(
        &self,
        call: &mut PendingToolCall,
        state: &AgentState,
    ) -> Option<StateUpdate> {
        if call.name == TASK_TOOL && !state.has_plan() {
            info!("Delegation refused: no plan recorded yet");
            call.veto(json!({ "success": false, "error": PLAN_REQUIRED_ERROR }));
        }
        None
    }
}
