//! Chat-completion response envelope exposed to callers.

use serde::{Deserialize, Serialize};

use super::message::ToolCall;

/// Canonical chat-completion envelope, independent of any backend shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    /// Fresh `chatcmpl-<uuid>` identifier.
    pub id: String,
    /// Generation timestamp (unix seconds).
    pub created: i64,
    pub object: String,
    pub choices: Vec<Choice>,
    pub usage: CompletionUsage,
}

impl ChatCompletion {
    /// The first (and only) choice's message, if present.
    pub fn message(&self) -> Option<&CompletionMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    pub finish_reason: String,
    pub index: u32,
    pub message: CompletionMessage,
}

/// Assistant message inside the envelope. `tool_calls` and `function_call`
/// serialize as literal `null` when absent: envelope consumers expect the
/// keys to be present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionMessage {
    pub content: String,
    pub role: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub function_call: Option<serde_json::Value>,
}

/// Token counters reported by the backend, zero when unreported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionUsage {
    pub completion_tokens: u32,
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}
