//! The state container shared by the execution loop and every middleware.
//!
//! One [`AgentState`] lives as long as its agent. The well-known keys are
//! explicit fields; anything a custom middleware wants to keep for itself
//! goes into `extensions`. Entries other than `messages`/`iteration` are
//! created lazily by whichever component first needs them.
//!
//! `iteration` is deliberately absent from [`StateUpdate`]: only the loop
//! advances it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::message::{Message, Role};

/// Status of a planned task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the plan recorded under `todos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    /// Assigned by the planning middleware on first creation, stable after.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// What needs to be done.
    pub content: String,

    /// Present-continuous phrasing shown while the task runs.
    #[serde(rename = "activeForm", default)]
    pub active_form: String,

    #[serde(default)]
    pub status: TodoStatus,
}

impl Todo {
    pub fn new(content: impl Into<String>, status: TodoStatus) -> Self {
        let content = content.into();
        Self {
            id: None,
            active_form: content.clone(),
            content,
            status,
        }
    }
}

/// The mutable record one agent's loop and middleware operate on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    /// Conversation order; index 0 is the standing system instruction once
    /// initialized.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Current loop counter within one task execution.
    #[serde(default)]
    pub iteration: u32,

    /// Guards one-time setup of `messages`/`iteration`.
    #[serde(default)]
    pub initialized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<Todo>>,

    /// Flat virtual filesystem: path → content. Never shrinks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub summarization_count: u32,

    /// Middleware-private keys.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `messages` and `iteration` on first use. Returns `true` if this
    /// call did the seeding.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.messages = Vec::new();
        self.iteration = 0;
        self.initialized = true;
        true
    }

    /// The recorded plan, empty if none has been written yet.
    pub fn todos(&self) -> &[Todo] {
        self.todos.as_deref().unwrap_or(&[])
    }

    pub fn has_plan(&self) -> bool {
        !self.todos().is_empty()
    }

    /// Read a virtual file.
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.as_ref()?.get(path).map(String::as_str)
    }

    /// The virtual filesystem, created on first access.
    pub fn files_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.files.get_or_insert_with(BTreeMap::new)
    }

    /// Whether `messages` starts with the standing system instruction.
    pub fn has_system_message(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System)
    }

    /// Shallow-merge an update: every field present in the update replaces
    /// the current value wholesale; extension keys are merged one by one.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(messages) = update.messages {
            self.messages = messages;
        }
        if let Some(todos) = update.todos {
            self.todos = Some(todos);
        }
        if let Some(files) = update.files {
            self.files = Some(files);
        }
        if let Some(count) = update.summarization_count {
            self.summarization_count = count;
        }
        for (key, value) in update.extensions {
            self.extensions.insert(key, value);
        }
    }
}

/// A set of top-level replacements a middleware hook asks the pipeline to
/// apply to the state container.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Option<Vec<Message>>,
    pub todos: Option<Vec<Todo>>,
    pub files: Option<BTreeMap<String, String>>,
    pub summarization_count: Option<u32>,
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

impl StateUpdate {
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    pub fn todos(todos: Vec<Todo>) -> Self {
        Self {
            todos: Some(todos),
            ..Self::default()
        }
    }

    pub fn files(files: BTreeMap<String, String>) -> Self {
        Self {
            files: Some(files),
            ..Self::default()
        }
    }

    pub fn extension(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut extensions = serde_json::Map::new();
        extensions.insert(key.into(), value);
        Self {
            extensions,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_none()
            && self.todos.is_none()
            && self.files.is_none()
            && self.summarization_count.is_none()
            && self.extensions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_only_once() {
        let mut state = AgentState::new();
        assert!(state.initialize());
        state.messages.push(Message::user("hi"));
        state.iteration = 3;
        assert!(!state.initialize());
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.iteration, 3);
    }

    #[test]
    fn files_are_created_lazily() {
        let mut state = AgentState::new();
        assert!(state.files.is_none());
        assert!(state.file("/a").is_none());
        state.files_mut().insert("/a".into(), "alpha".into());
        assert_eq!(state.file("/a"), Some("alpha"));
    }

    #[test]
    fn apply_replaces_present_fields_only() {
        let mut state = AgentState::new();
        state.messages.push(Message::user("keep me"));
        state.summarization_count = 2;

        state.apply(StateUpdate::todos(vec![Todo::new("step", TodoStatus::Pending)]));

        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.summarization_count, 2);
        assert_eq!(state.todos().len(), 1);
    }

    #[test]
    fn later_update_wins() {
        let mut state = AgentState::new();
        state.apply(StateUpdate::extension("owner", json!("first")));
        state.apply(StateUpdate::extension("owner", json!("second")));
        assert_eq!(state.extensions["owner"], "second");
    }

    #[test]
    fn todo_serializes_active_form_in_camel_case() {
        let todo = Todo::new("Write report", TodoStatus::InProgress);
        let value = serde_json::to_value(&todo).unwrap();
        assert_eq!(value["activeForm"], "Write report");
        assert_eq!(value["status"], "in_progress");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn todo_deserializes_with_defaults() {
        let todo: Todo = serde_json::from_value(json!({"content": "x"})).unwrap();
        assert_eq!(todo.status, TodoStatus::Pending);
        assert!(todo.id.is_none());
        assert!(todo.active_form.is_empty());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(StateUpdate::default().is_empty());
        assert!(!StateUpdate::messages(vec![]).is_empty());
    }
}
