//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Good enough to
//! decide when a transcript is getting too long; never used for billing.

use deepclaw_core::message::Message;

/// Estimate the token count for a string. Rounds down.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Estimate tokens for a single message: its content plus the serialized
/// form of any tool calls it carries.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|tc| estimate_tokens(&serde_json::to_string(tc).unwrap_or_default()))
        .sum();
    estimate_tokens(&message.content) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
