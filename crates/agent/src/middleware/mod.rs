//! Middleware: pluggable observers of the execution loop.
//!
//! A middleware gets four extension points per iteration:
//!
//! ```text
//! before_llm ─► model call ─► after_llm ─► for each tool call:
//!                                            before_tool ─► execute ─► after_tool
//! ```
//!
//! Hooks read the state container and hand back a [`StateUpdate`]; the
//! pipeline merges it before the next middleware runs, so later middleware
//! see (and may overwrite) what earlier ones wrote. The tool hooks also get
//! the in-flight call or result by `&mut`, which is how a middleware rewrites
//! it for the rest of the chain.
//!
//! To veto a tool call, `before_tool` calls [`PendingToolCall::veto`]; the
//! loop then records the supplied result without running the tool.

pub mod delegation;
pub mod eviction;
pub mod planning;
pub mod summarization;

use std::sync::Arc;

use async_trait::async_trait;
use deepclaw_core::message::Message;
use deepclaw_core::state::{AgentState, StateUpdate};
use deepclaw_core::tool::Tool;

pub use delegation::{
    DelegationMiddleware, SubAgent, SubAgentFactory, SubAgentSpec, TASK_TOOL, TaskTool,
};
pub use eviction::EvictionMiddleware;
pub use planning::PlanningMiddleware;
pub use summarization::SummarizationMiddleware;

/// A tool call the model asked for, as it travels through the
/// `before_tool` chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments; always a JSON object.
    pub arguments: serde_json::Value,
    /// Set by a middleware that wants the tool not to run.
    pub skip_execution: bool,
    /// Result to record instead of executing, when skipped.
    pub result: Option<serde_json::Value>,
}

impl PendingToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            skip_execution: false,
            result: None,
        }
    }

    /// Skip execution and record `result` as the outcome.
    pub fn veto(&mut self, result: serde_json::Value) {
        self.skip_execution = true;
        self.result = Some(result);
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Fragment appended to the agent's system prompt.
    fn system_prompt(&self) -> Option<String> {
        None
    }

    /// Extra tools this middleware contributes to the agent.
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    async fn before_llm(&self, _state: &AgentState) -> Option<StateUpdate> {
        None
    }

    async fn after_llm(&self, _state: &AgentState, _response: &Message) -> Option<StateUpdate> {
        None
    }

    async fn before_tool(
        &self,
        _call: &mut PendingToolCall,
        _state: &AgentState,
    ) -> Option<StateUpdate> {
        None
    }

    async fn after_tool(
        &self,
        _call: &PendingToolCall,
        _result: &mut serde_json::Value,
        _state: &AgentState,
    ) -> Option<StateUpdate> {
        None
    }
}

/// An ordered list of middleware. Order is significant: each hook runs the
/// middleware front to back.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.push(middleware);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Prompt fragments, in pipeline order.
    pub fn system_prompts(&self) -> Vec<String> {
        self.middleware
            .iter()
            .filter_map(|m| m.system_prompt())
            .collect()
    }

    /// Tools contributed by all middleware.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.middleware.iter().flat_map(|m| m.tools()).collect()
    }

    pub async fn run_before_llm(&self, state: &mut AgentState) {
        for m in &self.middleware {
            if let Some(update) = m.before_llm(state).await {
                state.apply(update);
            }
        }
    }

    pub async fn run_after_llm(&self, state: &mut AgentState, response: &Message) {
        for m in &self.middleware {
            if let Some(update) = m.after_llm(state, response).await {
                state.apply(update);
            }
        }
    }

    pub async fn run_before_tool(&self, call: &mut PendingToolCall, state: &mut AgentState) {
        for m in &self.middleware {
            if let Some(update) = m.before_tool(call, state).await {
                state.apply(update);
            }
        }
    }

    pub async fn run_after_tool(
        &self,
        call: &PendingToolCall,
        result: &mut serde_json::Value,
        state: &mut AgentState,
    ) {
        for m in &self.middleware {
            if let Some(update) = m.after_tool(call, result, state).await {
                state.apply(update);
            }
        }
    }
}

/// Render a tool result value into the text of a `tool` turn.
///
/// Strings pass through, an object's `result` field is rendered in its
/// place, anything else becomes compact JSON.
pub fn render_tool_content(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => match map.get("result") {
            Some(inner) => render_tool_content(inner),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}
