//! Context eviction: keeps oversized tool output out of the transcript.
//!
//! Two rules run after every tool call, first match wins:
//!
//! 1. A textual result longer than the threshold is moved into the virtual
//!    filesystem at `/large_tool_results/<call id>` and replaced by a short
//!    notice pointing at it. A path that is already taken (models reuse call
//!    ids) gets a `-2`, `-3`... suffix, so earlier results stay readable.
//! 2. A call to one of the file-write tools has its path/content arguments
//!    mirrored into the virtual filesystem. The visible result is untouched.

use std::collections::BTreeMap;

use async_trait::async_trait;
use deepclaw_core::state::{AgentState, StateUpdate};
use serde_json::json;
use tracing::{debug, info};

use super::{Middleware, PendingToolCall};

const EVICTION_DIR: &str = "/large_tool_results";

pub struct EvictionMiddleware {
    threshold_chars: usize,
    write_tools: Vec<String>,
}

impl EvictionMiddleware {
    pub fn new(threshold_chars: usize, write_tools: Vec<String>) -> Self {
        Self {
            threshold_chars,
            write_tools,
        }
    }

    /// Path under which the result of `call_id` is stored.
    pub fn evicted_path(call_id: &str) -> String {
        let id = if call_id.is_empty() {
            "unknown"
        } else {
            call_id
        };
        format!("{EVICTION_DIR}/{id}")
    }
}

impl Default for EvictionMiddleware {
    fn default() -> Self {
        Self::new(80_000, vec!["write_file".into(), "save_file".into()])
    }
}

/// `base`, or the first of `base-2`, `base-3`... not yet in `files`.
fn free_path(files: &BTreeMap<String, String>, base: &str) -> String {
    let mut path = base.to_string();
    let mut n = 1;
    while files.contains_key(&path) {
        n += 1;
        path = format!("{base}-{n}");
    }
    path
}

/// First non-empty string among `keys`.
fn string_arg<'a>(args: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| args.get(*k).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
}

#[async_trait]
impl Middleware for EvictionMiddleware {
    fn name(&self) -> &str {
        "eviction"
    }

    async fn before_llm(&self, state: &AgentState) -> Option<StateUpdate> {
        if state.files.is_none() {
            return Some(StateUpdate::files(Default::default()));
        }
        None
    }

    async fn after_tool(
        &self,
        call: &PendingToolCall,
        result: &mut serde_json::Value,
        state: &AgentState,
    ) -> Option<StateUpdate> {
        if let Some(text) = result.as_str() {
            let size = text.chars().count();
            if size > self.threshold_chars {
                let mut files = state.files.clone().unwrap_or_default();
                let path = free_path(&files, &Self::evicted_path(&call.id));
                files.insert(path.clone(), text.to_string());

                info!(tool = %call.name, path = %path, size, "Evicted large tool result");
                *result = json!({
                    "evicted": true,
                    "original_size": size,
                    "file_path": path,
                    "message": format!(
                        "Result too large ({size} chars). Saved to {path} in the agent's virtual files."
                    ),
                });
                return Some(StateUpdate::files(files));
            }
        }

        if self.write_tools.iter().any(|t| *t == call.name) {
            let path = string_arg(&call.arguments, &["file_name", "path"]);
            let content = string_arg(&call.arguments, &["contents", "content"]);
            if let (Some(path), Some(content)) = (path, content) {
                debug!(path = %path, "Mirrored file write");
                let mut files = state.files.clone().unwrap_or_default();
                files.insert(path.to_string(), content.to_string());
                return Some(StateUpdate::files(files));
            }
        }

        None
    }
}
