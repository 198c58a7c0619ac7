//! Summarization: compacts the transcript once it grows past a token budget.
//!
//! Before every model call the transcript is measured with the
//! character-based estimate from [`crate::token`]. Over budget, everything
//! between the system message and the last `keep_last` messages is replaced
//! by one digest message. The digest comes from a model call; if that fails
//! a truncated listing of the old messages is used instead. The replaced
//! messages are gone for good.

use std::sync::Arc;

use async_trait::async_trait;
use deepclaw_core::error::ProviderError;
use deepclaw_core::message::Message;
use deepclaw_core::provider::{Provider, ProviderRequest};
use deepclaw_core::state::{AgentState, StateUpdate};
use tracing::{info, warn};

use super::Middleware;
use crate::token::estimate_messages_tokens;

const SUMMARY_PROMPT: &str = "\
You are a context extraction assistant. The conversation below is about to be \
replaced by whatever you write, because it no longer fits in the context window.

Extract the most important and relevant context: decisions made, facts \
discovered, results of tool calls, and work already completed, so that none of \
it has to be repeated. Leave out anything that does not serve the overall goal.

Respond ONLY with the extracted context, with no text before or after it.

Messages to summarize:
{messages}";

/// Messages beyond this many are left out of the fallback digest.
const FALLBACK_MESSAGES: usize = 20;
const FALLBACK_CHARS: usize = 200;
const PROMPT_CHARS: usize = 500;

pub struct SummarizationMiddleware {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens_before_summary: usize,
    keep_last: usize,
    temperature: f32,
    max_tokens: u32,
}

impl SummarizationMiddleware {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens_before_summary: 50_000,
            keep_last: 6,
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    /// Token budget above which the transcript is compacted.
    pub fn with_threshold(mut self, max_tokens_before_summary: usize) -> Self {
        self.max_tokens_before_summary = max_tokens_before_summary;
        self
    }

    /// Number of most recent messages kept verbatim.
    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last;
        self
    }

    /// Sampling parameters of the digest request.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    async fn generate_digest(&self, old: &[Message]) -> Result<String, ProviderError> {
        let prompt = SUMMARY_PROMPT.replace("{messages}", &format_for_summary(old));
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            tools: Vec::new(),
            stream: true,
        };

        let mut rx = self.provider.stream(request).await?;
        let mut digest = String::new();
        while let Some(chunk) = rx.recv().await {
            if let Some(content) = chunk?.content {
                digest.push_str(&content);
            }
        }

        let digest = digest.trim();
        if digest.is_empty() {
            return Err(ProviderError::StreamInterrupted(
                "summary response was empty".into(),
            ));
        }
        Ok(digest.to_string())
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Render messages for the extraction prompt.
fn format_for_summary(messages: &[Message]) -> String {
    let mut parts = Vec::new();
    for (i, msg) in messages.iter().enumerate() {
        if !msg.content.is_empty() {
            parts.push(format!(
                "Message {} ({}): {}",
                i + 1,
                msg.role,
                truncate_chars(&msg.content, PROMPT_CHARS)
            ));
        }
        if !msg.tool_calls.is_empty() {
            let names: Vec<&str> = msg.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
            parts.push(format!("  Tools called: {}", names.join(", ")));
        }
    }
    parts.join("\n")
}

/// Deterministic digest used when the model call fails.
fn fallback_digest(messages: &[Message]) -> String {
    messages
        .iter()
        .take(FALLBACK_MESSAGES)
        .map(|m| format!("{}: {}", m.role, truncate_chars(&m.content, FALLBACK_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Middleware for SummarizationMiddleware {
    fn name(&self) -> &str {
        "summarization"
    }

    async fn before_llm(&self, state: &AgentState) -> Option<StateUpdate> {
        let messages = &state.messages;
        if messages.len() <= self.keep_last + 1 {
            return None;
        }

        let before = estimate_messages_tokens(messages);
        if before <= self.max_tokens_before_summary {
            return None;
        }

        let (system, rest) = if state.has_system_message() {
            (Some(&messages[0]), &messages[1..])
        } else {
            (None, &messages[..])
        };
        if rest.len() <= self.keep_last {
            return None;
        }
        let (old, recent) = rest.split_at(rest.len() - self.keep_last);

        info!(
            old = old.len(),
            keep_last = self.keep_last,
            tokens = before,
            limit = self.max_tokens_before_summary,
            "Summarizing transcript"
        );

        let digest = match self.generate_digest(old).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!(error = %e, "Summary generation failed, truncating instead");
                fallback_digest(old)
            }
        };

        let mut summary = Message::user(format!(
            "[Context Summary - {} messages]:\n{digest}\n[End Summary]",
            old.len()
        ));
        summary
            .metadata
            .insert("summary".into(), serde_json::Value::Bool(true));

        let mut compacted = Vec::with_capacity(recent.len() + 2);
        compacted.extend(system.cloned());
        compacted.push(summary);
        compacted.extend_from_slice(recent);

        info!(
            before,
            after = estimate_messages_tokens(&compacted),
            "Summarization complete"
        );

        Some(StateUpdate {
            messages: Some(compacted),
            summarization_count: Some(state.summarization_count + 1),
            ..StateUpdate::default()
        })
    }
}
