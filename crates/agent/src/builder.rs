//! Assembles a ready-to-run agent from configuration.
//!
//! The default middleware stack, in order:
//!
//! ```text
//! planning → eviction → delegation → summarization → custom...
//! ```
//!
//! Sub-agents spawned through delegation get the same stack minus
//! delegation, so a delegated task can never delegate again.

use std::sync::Arc;

use deepclaw_config::AppConfig;
use deepclaw_core::event::EventBus;
use deepclaw_core::provider::Provider;
use deepclaw_core::task::{InMemoryTaskTracker, TaskTracker};
use deepclaw_core::tool::{Tool, ToolRegistry};
use tracing::debug;

use crate::loop_runner::StatefulAgent;
use crate::middleware::{
    DelegationMiddleware, EvictionMiddleware, Middleware, PlanningMiddleware, SubAgent,
    SubAgentFactory, SubAgentSpec, SummarizationMiddleware,
};

/// Everything the main agent and its sub-agents are built from.
struct Parts {
    config: AppConfig,
    provider: Arc<dyn Provider>,
    summary_provider: Arc<dyn Provider>,
    tracker: Arc<dyn TaskTracker>,
    event_bus: Arc<EventBus>,
}

impl Parts {
    fn agent(&self, name: &str, instruction: &str) -> StatefulAgent {
        let agent = &self.config.agent;
        StatefulAgent::new(name, instruction, self.provider.clone(), &agent.model)
            .with_temperature(agent.temperature)
            .with_max_tokens(agent.max_tokens)
            .with_max_iterations(agent.max_iterations)
            .with_event_bus(self.event_bus.clone())
    }

    /// Planning, eviction and summarization, each when enabled. Delegation
    /// slots in between eviction and summarization for the main agent.
    fn leading(&self) -> Vec<Arc<dyn Middleware>> {
        let mut stack: Vec<Arc<dyn Middleware>> = Vec::new();
        if self.config.middleware.planning {
            stack.push(Arc::new(PlanningMiddleware::new(self.tracker.clone())));
        }
        if self.config.middleware.eviction {
            stack.push(Arc::new(EvictionMiddleware::new(
                self.config.eviction.threshold_chars,
                self.config.eviction.write_tools.clone(),
            )));
        }
        stack
    }

    fn summarization(&self) -> Option<Arc<dyn Middleware>> {
        if !self.config.middleware.summarization {
            return None;
        }
        let cfg = &self.config.summarization;
        Some(Arc::new(
            SummarizationMiddleware::new(
                self.summary_provider.clone(),
                self.config.summarization_model(),
            )
            .with_threshold(cfg.max_tokens_before_summary)
            .with_keep_last(cfg.messages_to_keep)
            .with_sampling(cfg.temperature, cfg.max_tokens),
        ))
    }
}

/// Builds sub-agents that share the parent's provider, tracker, event bus
/// and tool instances.
pub struct StatefulAgentFactory {
    parts: Arc<Parts>,
    parent_tools: ToolRegistry,
}

impl StatefulAgentFactory {
    fn assemble(&self, spec: &SubAgentSpec) -> StatefulAgent {
        let mut tools = match &spec.tools {
            Some(names) => self.parent_tools.subset(names),
            None => self.parent_tools.clone(),
        };
        // A sub-agent can only finish through the completion tool.
        for tool in deepclaw_tools::default_tools() {
            tools.register(tool);
        }

        let mut agent = self.parts.agent(&spec.name, spec.instruction()).with_tools(tools);
        for middleware in self.parts.leading() {
            agent = agent.with_middleware(middleware);
        }
        if let Some(summarization) = self.parts.summarization() {
            agent = agent.with_middleware(summarization);
        }
        agent
    }
}

impl SubAgentFactory for StatefulAgentFactory {
    fn build(&self, spec: &SubAgentSpec) -> deepclaw_core::Result<Box<dyn SubAgent>> {
        let agent = self.assemble(spec);
        debug!(
            subagent = %spec.name,
            tools = ?agent.tools().names(),
            "Built sub-agent"
        );
        Ok(Box::new(agent))
    }
}

/// Builds a [`StatefulAgent`] with the default middleware stack from an
/// [`AppConfig`].
pub struct AgentBuilder {
    /// Validated when the agent is built
    config: AppConfig,

    /// The LLM provider for the agent and its sub-agents
    provider: Arc<dyn Provider>,

    /// Provider for summarization digests
    summary_provider: Option<Arc<dyn Provider>>,

    /// Task tracker behind planning
    tracker: Option<Arc<dyn TaskTracker>>,

    /// Event bus shared with sub-agents
    event_bus: Option<Arc<EventBus>>,

    /// User tools, registered after the defaults
    tools: Vec<Arc<dyn Tool>>,

    /// Custom middleware, run after the default stack
    middleware: Vec<Arc<dyn Middleware>>,
}

impl AgentBuilder {
    /// Start from a configuration and the provider the agent talks to.
    pub fn new(config: AppConfig, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            summary_provider: None,
            tracker: None,
            event_bus: None,
            tools: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Provider for digest requests; the agent's provider when unset.
    pub fn with_summary_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.summary_provider = Some(provider);
        self
    }

    /// Task tracker behind the planning middleware; in-memory when unset.
    pub fn with_task_tracker(mut self, tracker: Arc<dyn TaskTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Publish domain events of the agent and its sub-agents on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Register a user tool. Sub-agents can use it too.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Append a middleware after the default stack.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Validate the configuration and assemble the agent.
    ///
    /// Fails with [`deepclaw_core::Error::Config`] when validation fails.
    pub fn build(self) -> deepclaw_core::Result<StatefulAgent> {
        self.config
            .validate()
            .map_err(|e| deepclaw_core::Error::Config {
                message: e.to_string(),
            })?;

        let mut tools = ToolRegistry::new();
        if self.config.agent.include_default_tools {
            for tool in deepclaw_tools::default_tools() {
                tools.register(tool);
            }
        }
        for tool in self.tools {
            tools.register(tool);
        }

        let parts = Arc::new(Parts {
            summary_provider: self
                .summary_provider
                .unwrap_or_else(|| self.provider.clone()),
            provider: self.provider,
            tracker: self
                .tracker
                .unwrap_or_else(|| Arc::new(InMemoryTaskTracker::new())),
            event_bus: self.event_bus.unwrap_or_default(),
            config: self.config,
        });

        let mut stack = parts.leading();
        if parts.config.middleware.delegation {
            let mut specs = Vec::new();
            if parts.config.delegation.general_purpose {
                specs.push(SubAgentSpec::general_purpose(
                    &parts.config.delegation.subagent_instruction,
                ));
            }
            specs.extend(parts.config.subagents.iter().map(SubAgentSpec::from));

            let factory = StatefulAgentFactory {
                parts: parts.clone(),
                parent_tools: tools.clone(),
            };
            stack.push(Arc::new(DelegationMiddleware::new(Arc::new(factory), specs)));
        }
        stack.extend(parts.summarization());
        stack.extend(self.middleware);

        let agent_cfg = &parts.config.agent;
        let mut agent = parts.agent(&agent_cfg.name, &agent_cfg.instruction).with_tools(tools);
        for middleware in stack {
            agent = agent.with_middleware(middleware);
        }

        debug!(
            agent = %agent.name(),
            middleware = ?agent.pipeline().names(),
            tools = ?agent.tools().names(),
            "Agent assembled"
        );
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::TASK_TOOL;
    use crate::test_helpers::{Script, ScriptedProvider, call};
    use async_trait::async_trait;
    use deepclaw_config::SubAgentConfig;
    use deepclaw_core::error::ToolError;
    use deepclaw_core::message::Role;
    use deepclaw_core::tool::ToolResult;
    use serde_json::json;

    struct Lookup;

    #[async_trait]
    impl Tool for Lookup {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "Look something up"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text("found it"))
        }
    }

    fn researcher() -> SubAgentConfig {
        SubAgentConfig {
            name: "researcher".into(),
            description: "Digs up facts".into(),
            system_prompt: Some("You research.".into()),
            tools: Some(vec!["lookup".into()]),
        }
    }

    #[test]
    fn default_stack_order_and_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = AgentBuilder::new(AppConfig::default(), provider)
            .with_tool(Arc::new(Lookup))
            .build()
            .unwrap();

        assert_eq!(
            agent.pipeline().names(),
            vec!["planning", "eviction", "delegation", "summarization"]
        );
        assert_eq!(
            agent.tools().names(),
            vec!["completion", "lookup", TASK_TOOL, "write_todos"]
        );
        assert_eq!(agent.max_iterations(), 10);
    }

    #[test]
    fn disabled_middleware_is_left_out() {
        let mut config = AppConfig::default();
        config.middleware.delegation = false;
        config.middleware.summarization = false;
        config.agent.include_default_tools = false;
        let provider = Arc::new(ScriptedProvider::new(vec![]));

        let agent = AgentBuilder::new(config, provider).build().unwrap();

        assert_eq!(agent.pipeline().names(), vec!["planning", "eviction"]);
        assert!(agent.tools().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        let provider = Arc::new(ScriptedProvider::new(vec![]));

        let err = AgentBuilder::new(config, provider).build().err().unwrap();
        assert!(matches!(err, deepclaw_core::Error::Config { .. }));
    }

    #[test]
    fn delegation_without_planning_is_rejected() {
        let mut config = AppConfig::default();
        config.middleware.planning = false;
        let provider = Arc::new(ScriptedProvider::new(vec![]));

        let err = AgentBuilder::new(config, provider).build().err().unwrap();
        assert!(err.to_string().contains("requires middleware.planning"));
    }

    fn factory(parent_tools: ToolRegistry) -> StatefulAgentFactory {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![]));
        StatefulAgentFactory {
            parts: Arc::new(Parts {
                summary_provider: provider.clone(),
                provider,
                tracker: Arc::new(InMemoryTaskTracker::new()),
                event_bus: Arc::new(EventBus::default()),
                config: AppConfig::default(),
            }),
            parent_tools,
        }
    }

    #[test]
    fn sub_agent_gets_stack_without_delegation() {
        let mut parent_tools = deepclaw_tools::default_registry();
        parent_tools.register(Arc::new(Lookup));
        let factory = factory(parent_tools);

        let agent = factory.assemble(&SubAgentSpec::general_purpose("help"));

        assert_eq!(
            agent.pipeline().names(),
            vec!["planning", "eviction", "summarization"]
        );
        assert_eq!(
            agent.tools().names(),
            vec!["completion", "lookup", "write_todos"]
        );
        assert_eq!(agent.name(), "general-purpose");
        assert!(factory.build(&SubAgentSpec::general_purpose("help")).is_ok());
    }

    #[test]
    fn sub_agent_tool_list_is_restricted() {
        let mut parent_tools = ToolRegistry::new();
        parent_tools.register(Arc::new(Lookup));
        let mut restricted = researcher();
        restricted.tools = Some(vec!["missing".into()]);

        let agent = factory(parent_tools).assemble(&SubAgentSpec::from(&restricted));

        assert_eq!(agent.tools().names(), vec!["completion", "write_todos"]);
    }

    #[tokio::test]
    async fn delegates_to_configured_sub_agent() {
        let mut config = AppConfig::default();
        config.subagents.push(researcher());
        let todos = json!({"todos": [{"content": "Research", "activeForm": "Researching", "status": "in_progress"}]});
        let provider = Arc::new(ScriptedProvider::new(vec![
            // Main agent: plan, then delegate.
            Script::tool_calls("", vec![call("p", "write_todos", todos)]),
            Script::tool_calls(
                "",
                vec![call(
                    "t",
                    TASK_TOOL,
                    json!({"description": "Find the capital of France", "subagent_type": "researcher"}),
                )],
            ),
            // Sub-agent: look up, then finish.
            Script::tool_calls("", vec![call("l", "lookup", json!({}))]),
            Script::tool_calls("Paris", vec![call("c1", "completion", json!({}))]),
            // Main agent finishes.
            Script::tool_calls("Answer: Paris", vec![call("c2", "completion", json!({}))]),
        ]));

        let mut agent = AgentBuilder::new(config, provider.clone())
            .with_tool(Arc::new(Lookup))
            .build()
            .unwrap();
        let outcome = agent.run("What is the capital of France?").await.unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.iterations, 3);

        let report = agent
            .state()
            .messages
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("t"))
            .unwrap();
        assert_eq!(report.content, "Paris");

        // The sub-agent saw only its own tools and its own prompt.
        let sub_request = &provider.requests()[2];
        assert!(sub_request.messages[0].content.starts_with("You are researcher"));
        assert!(sub_request.messages[0].content.contains("You research."));
        let names: Vec<&str> = sub_request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["completion", "lookup", "write_todos"]);
        assert_eq!(sub_request.messages[1].role, Role::User);
        assert_eq!(sub_request.messages[1].content, "Find the capital of France");
    }
}
