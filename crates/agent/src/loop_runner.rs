//! The stateful execution loop.
//!
//! One [`StatefulAgent`] owns a state container, a tool registry and a
//! middleware pipeline. Each task runs through:
//!
//! 1. **Init**: seed the state on first use, install the system prompt once,
//!    append the task as a user turn
//! 2. **Iterate** until completion or the iteration ceiling: before-LLM hooks,
//!    streamed model call, after-LLM hooks, then every requested tool call in
//!    order through the before/after-tool hooks
//! 3. **Done**: report whether the completion tool was called
//!
//! Running out of iterations is a normal outcome, not an error. Tool-level
//! failures become `tool` turns the model can react to; only a failing model
//! call aborts the run.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use deepclaw_core::event::{DomainEvent, EventBus};
use deepclaw_core::message::{Message, MessageToolCall, Role};
use deepclaw_core::provider::{Provider, ProviderRequest};
use deepclaw_core::state::AgentState;
use deepclaw_core::tool::{Tool, ToolCall, ToolRegistry};
use deepclaw_tools::COMPLETION_TOOL;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::middleware::{
    Middleware, MiddlewarePipeline, PendingToolCall, SubAgent, render_tool_content,
};
use crate::prompt::{PromptBuilder, TaskInput};
use crate::stream_event::AgentStreamEvent;

/// How a task execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// All assistant-authored content in the transcript, one turn per line.
    pub output: String,
    /// Iterations used by this execution.
    pub iterations: u32,
    /// Whether the completion tool was called; `false` means the iteration
    /// ceiling was reached.
    pub completed: bool,
}

type EventSink<'a> = Option<&'a mpsc::Sender<AgentStreamEvent>>;

async fn emit(events: EventSink<'_>, event: AgentStreamEvent) {
    if let Some(tx) = events {
        // A caller that stopped listening doesn't stop the run.
        let _ = tx.send(event).await;
    }
}

/// An agent that keeps its conversation and middleware state across runs.
pub struct StatefulAgent {
    /// Agent name, used in the system prompt and in logs
    name: String,

    /// Standing instruction placed in the system prompt
    instruction: String,

    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Maximum loop iterations per task
    max_iterations: u32,

    /// Tool registry, including tools contributed by middleware
    tools: ToolRegistry,

    /// Middleware run at the four extension points
    pipeline: MiddlewarePipeline,

    /// State container shared with the middleware
    state: AgentState,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl StatefulAgent {
    /// Create an agent with no tools, no middleware and an empty state.
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: Some(500),
            max_iterations: 10,
            tools: ToolRegistry::new(),
            pipeline: MiddlewarePipeline::new(),
            state: AgentState::new(),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of loop iterations per task.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Replace the tool registry. Tools contributed by middleware already
    /// installed are kept.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        for tool in self.pipeline.tools() {
            self.tools.register(tool);
        }
        self
    }

    /// Append a middleware and register the tools it contributes.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        for tool in middleware.tools() {
            self.tools.register(tool);
        }
        self.pipeline.push(middleware);
        self
    }

    /// Publish domain events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Start from an existing state container instead of an empty one.
    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    /// Register an additional tool.
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.register(tool);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }

    /// Drop the conversation and everything middleware recorded.
    pub fn reset(&mut self) {
        self.state = AgentState::new();
    }

    /// Run a task to completion and return the concatenated assistant output.
    pub async fn run(
        &mut self,
        input: impl Into<TaskInput>,
    ) -> Result<RunOutcome, deepclaw_core::Error> {
        self.execute(input.into(), None).await
    }

    /// Run a task, pushing text chunks and tool notices to `events` as they
    /// happen.
    pub async fn run_stream(
        &mut self,
        input: impl Into<TaskInput>,
        events: mpsc::Sender<AgentStreamEvent>,
    ) -> Result<RunOutcome, deepclaw_core::Error> {
        self.execute(input.into(), Some(&events)).await
    }

    async fn execute(
        &mut self,
        input: TaskInput,
        events: EventSink<'_>,
    ) -> Result<RunOutcome, deepclaw_core::Error> {
        if self.state.initialize() {
            debug!(agent = %self.name, "State initialized");
        }

        let system_prompt = PromptBuilder::new(&self.name, &self.instruction, &self.tools)
            .build(&input, &self.pipeline.system_prompts());
        if !self.state.has_system_message() {
            self.state.messages.insert(0, Message::system(system_prompt));
        }
        self.state.messages.push(Message::user(&input.task));
        self.state.iteration = 0;

        info!(
            agent = %self.name,
            messages = self.state.messages.len(),
            max_iterations = self.max_iterations,
            "Starting task"
        );

        let definitions = self.tools.definitions();
        let mut done = false;

        while !done && self.state.iteration < self.max_iterations {
            self.state.iteration += 1;
            let iteration = self.state.iteration;
            debug!(agent = %self.name, iteration, "Agent loop iteration");

            self.pipeline.run_before_llm(&mut self.state).await;

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: self.state.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
                stream: true,
            };

            let mut rx = self.provider.stream(request).await?;
            let mut content = String::new();
            let mut tool_calls: Vec<MessageToolCall> = Vec::new();
            while let Some(chunk) = rx.recv().await {
                let chunk = chunk?;
                if let Some(delta) = chunk.content
                    && !delta.is_empty()
                {
                    content.push_str(&delta);
                    emit(events, AgentStreamEvent::Chunk { content: delta }).await;
                }
                // The model may revise its calls while streaming.
                if !chunk.tool_calls.is_empty() {
                    tool_calls = chunk.tool_calls;
                }
            }

            let response = Message::assistant(content).with_tool_calls(tool_calls.clone());
            self.state.messages.push(response.clone());
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                agent: self.name.clone(),
                iteration,
                tool_calls: tool_calls.len(),
                timestamp: Utc::now(),
            });

            self.pipeline.run_after_llm(&mut self.state, &response).await;

            if !tool_calls.is_empty() {
                debug!(tool_count = tool_calls.len(), "Executing tool calls");
            }
            for tc in &tool_calls {
                if self.dispatch(tc, events).await {
                    done = true;
                }
            }
        }

        let iterations = self.state.iteration;
        if !done {
            warn!(
                agent = %self.name,
                iterations,
                "Iteration budget exhausted before completion"
            );
        }
        self.event_bus.publish(DomainEvent::RunFinished {
            agent: self.name.clone(),
            iterations,
            completed: done,
            timestamp: Utc::now(),
        });
        emit(
            events,
            AgentStreamEvent::Done {
                iterations,
                completed: done,
            },
        )
        .await;

        let output = self
            .state
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        Ok(RunOutcome {
            output,
            iterations,
            completed: done,
        })
    }

    /// Run one tool call through the pipeline and record its outcome.
    /// Returns `true` if it was the completion tool.
    async fn dispatch(&mut self, tc: &MessageToolCall, events: EventSink<'_>) -> bool {
        let arguments = match tc.parse_arguments() {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %tc.name, error = %e, "Unusable tool arguments");
                self.record_tool_error(&tc.id, &tc.name, &e.to_string(), events)
                    .await;
                return false;
            }
        };

        let mut call = PendingToolCall::new(&tc.id, &tc.name, arguments);
        self.pipeline
            .run_before_tool(&mut call, &mut self.state)
            .await;

        let start = Instant::now();
        let (mut result, success) = if call.skip_execution {
            debug!(tool = %call.name, "Tool call handled by middleware");
            let result = call
                .result
                .clone()
                .unwrap_or_else(|| serde_json::json!({ "success": true }));
            let success = result
                .get("success")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            (result, success)
        } else {
            let request = ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            };
            match self.tools.execute(&request).await {
                Ok(output) => {
                    let success = output.success;
                    (output.into_value(), success)
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool execution failed");
                    self.publish_tool(&call, false, start);
                    self.record_tool_error(&call.id, &call.name, &e.to_string(), events)
                        .await;
                    return false;
                }
            }
        };

        self.pipeline
            .run_after_tool(&call, &mut result, &mut self.state)
            .await;

        let content = render_tool_content(&result);
        self.state
            .messages
            .push(Message::tool_result(&call.id, &call.name, &content));
        self.publish_tool(&call, success, start);
        emit(
            events,
            AgentStreamEvent::ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                content,
            },
        )
        .await;

        call.name == COMPLETION_TOOL
    }

    fn publish_tool(&self, call: &PendingToolCall, success: bool, start: Instant) {
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            skipped: call.skip_execution,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    async fn record_tool_error(
        &mut self,
        id: &str,
        name: &str,
        reason: &str,
        events: EventSink<'_>,
    ) {
        let message = format!("Error: {reason}");
        self.state
            .messages
            .push(Message::tool_result(id, name, &message));
        emit(
            events,
            AgentStreamEvent::ToolError {
                id: id.to_string(),
                name: name.to_string(),
                message,
            },
        )
        .await;
    }
}

#[async_trait]
impl SubAgent for StatefulAgent {
    /// Each delegated task starts on a fresh state container.
    async fn run_task(&mut self, task: &str) -> deepclaw_core::Result<String> {
        self.reset();
        let outcome = self.run(task).await?;
        Ok(outcome.output)
    }
}
