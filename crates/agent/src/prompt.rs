//! System prompt composition.
//!
//! The base prompt introduces the agent, states the current goal and its
//! success criteria, and lists the tools. Middleware fragments follow,
//! separated by blank lines.

use deepclaw_core::tool::ToolRegistry;

/// One task handed to an agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInput {
    pub task: String,
    /// Defaults to the task itself.
    pub goal: Option<String>,
    /// Defaults to [`DEFAULT_SUCCESS_CRITERIA`].
    pub success_criteria: Option<Vec<String>>,
}

impl TaskInput {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_success_criteria(mut self, criteria: Vec<String>) -> Self {
        self.success_criteria = Some(criteria);
        self
    }

    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or(&self.task)
    }
}

impl From<&str> for TaskInput {
    fn from(task: &str) -> Self {
        Self::new(task)
    }
}

impl From<String> for TaskInput {
    fn from(task: String) -> Self {
        Self::new(task)
    }
}

pub const DEFAULT_SUCCESS_CRITERIA: [&str; 4] = [
    "Understand the task requirements",
    "Use available tools when needed",
    "Provide clear reasoning for actions",
    "Complete the task successfully",
];

pub struct PromptBuilder<'a> {
    name: &'a str,
    instruction: &'a str,
    tools: &'a ToolRegistry,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(name: &'a str, instruction: &'a str, tools: &'a ToolRegistry) -> Self {
        Self {
            name,
            instruction,
            tools,
        }
    }

    /// Compose the full system prompt for `input`.
    pub fn build(&self, input: &TaskInput, fragments: &[String]) -> String {
        let criteria = match &input.success_criteria {
            Some(list) => list.iter().map(|c| format!("- {c}")).collect::<Vec<_>>(),
            None => DEFAULT_SUCCESS_CRITERIA
                .iter()
                .map(|c| format!("- {c}"))
                .collect(),
        };

        let tools: Vec<String> = self
            .tools
            .tools()
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect();

        let mut prompt = format!(
            "You are {name}, an AI agent.\n\n{instruction}\n\n\
             ## Current Task\nGoal: {goal}\n\nSuccess Criteria:\n{criteria}\n\n\
             ## Available Tools\n{tools}\n\n\
             Work through the task step by step, using tools where they help. \
             Call the completion tool once every success criterion is met.",
            name = self.name,
            instruction = self.instruction,
            goal = input.goal(),
            criteria = criteria.join("\n"),
            tools = tools.join("\n"),
        );

        for fragment in fragments {
            prompt.push_str("\n\n");
            prompt.push_str(fragment);
        }
        prompt
    }
}
