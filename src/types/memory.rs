//! Bounded conversation history.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Default history bound.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// Ordered, FIFO-bounded message history. Owned by exactly one engine
/// instance; appending past the bound evicts the oldest entries so the most
/// recent `max_messages` remain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl Memory {
    /// Create an empty memory bounded at `max_messages`.
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    /// Append one message, evicting from the front if over the bound.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
    }

    /// Append several messages in order.
    pub fn add_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.truncate();
    }

    fn truncate(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Remove all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent `n` messages, in original relative order.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Convert the history to JSON values (absent fields omitted).
    pub fn to_values(&self) -> Vec<serde_json::Value> {
        self.messages.iter().map(Message::to_value).collect()
    }
}
