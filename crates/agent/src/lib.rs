//! The stateful agent loop of deepclaw.
//!
//! An agent works through a task in a **Plan → Act → Observe** cycle:
//!
//! 1. **Receive** a task (from a caller or a delegating parent agent)
//! 2. **Prepare** the state: middleware may compact the transcript or seed
//!    empty fields before each model call
//! 3. **Send to LLM** via the configured provider, streaming the reply
//! 4. **If tool calls**: run each through the middleware pipeline, which may
//!    veto, rewrite or post-process it, then append the result
//! 5. **Stop** once the completion tool is called or the iteration ceiling
//!    is reached
//!
//! Planning, large-result eviction, transcript summarization and sub-agent
//! delegation are all middleware; the loop itself knows none of them.

pub mod builder;
pub mod loop_runner;
pub mod middleware;
pub mod prompt;
pub mod stream_event;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use builder::{AgentBuilder, StatefulAgentFactory};
pub use loop_runner::{RunOutcome, StatefulAgent};
pub use middleware::{
    DelegationMiddleware, EvictionMiddleware, Middleware, MiddlewarePipeline, PendingToolCall,
    PlanningMiddleware, SubAgent, SubAgentFactory, SubAgentSpec, SummarizationMiddleware,
    TASK_TOOL, TaskTool,
};
pub use prompt::{PromptBuilder, TaskInput};
pub use stream_event::AgentStreamEvent;
pub use token::{estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
