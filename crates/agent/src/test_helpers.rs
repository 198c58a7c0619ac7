//! Shared test helpers: a provider that replays scripted streams.

use std::collections::VecDeque;
use std::sync::Mutex;

use deepclaw_core::error::ProviderError;
use deepclaw_core::message::{Message, MessageToolCall};
use deepclaw_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use tokio::sync::mpsc;

/// One scripted model reply.
#[derive(Clone)]
pub enum Script {
    Chunks(Vec<StreamChunk>),
    Fail(ProviderError),
}

impl Script {
    /// A single text chunk, no tool calls.
    pub fn text(text: &str) -> Self {
        Self::Chunks(vec![StreamChunk {
            done: true,
            ..StreamChunk::text(text)
        }])
    }

    /// Optional text followed by a final chunk carrying `calls`.
    pub fn tool_calls(text: &str, calls: Vec<MessageToolCall>) -> Self {
        let mut chunks = Vec::new();
        if !text.is_empty() {
            chunks.push(StreamChunk::text(text));
        }
        chunks.push(StreamChunk {
            tool_calls: calls,
            done: true,
            ..StreamChunk::default()
        });
        Self::Chunks(chunks)
    }

    pub fn fail(error: ProviderError) -> Self {
        Self::Fail(error)
    }
}

/// Shorthand for a tool call with structured arguments.
pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(id, name, arguments)
}

/// Replays scripts in order and records every request. When the queue runs
/// dry it repeats the `fallback` script, or fails if there is none.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Option<Script>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `script`.
    pub fn repeating(script: Script) -> Self {
        Self {
            fallback: Some(script),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_script(&self, request: ProviderRequest) -> Result<Vec<StreamChunk>, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());
        match script {
            Some(Script::Chunks(chunks)) => Ok(chunks),
            Some(Script::Fail(e)) => Err(e),
            None => Err(ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let chunks = self.next_script(request)?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for chunk in chunks {
            content.push_str(chunk.content.as_deref().unwrap_or(""));
            if !chunk.tool_calls.is_empty() {
                tool_calls = chunk.tool_calls;
            }
        }
        Ok(ProviderResponse {
            message: Message::assistant(content).with_tool_calls(tool_calls),
            usage: None,
            model: "scripted-model".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let chunks = self.next_script(request)?;
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            let _ = tx.send(Ok(chunk)).await;
        }
        Ok(rx)
    }
}
