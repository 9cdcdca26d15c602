//! Stateful assembly of streamed response events.

use std::collections::{BTreeMap, HashMap};

use crate::error::{DroverError, Result};
use crate::types::ChatCompletion;

use super::convert::{from_converse_response, ConversionContext};
use super::wire::{
    ContentBlock, ConverseOutput, ConverseResponse, ConverseStreamEvent, ToolUseBlock, WireMessage,
    WireUsage,
};

/// Fragment to forward to a live output listener, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelta {
    /// Incremental reply text.
    Text(String),
    /// Raw fragment of a tool call's argument JSON.
    ToolInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    ToolUse,
}

#[derive(Debug)]
struct PendingToolUse {
    tool_use_id: String,
    name: String,
    input_buf: String,
    input: Option<serde_json::Value>,
}

/// Accumulator over a streamed event sequence.
///
/// Content blocks are matched by kind, not position: a block's kind is
/// recorded when it first appears (tool-use at `contentBlockStart`, text at
/// its first delta), so any number of text and tool-use blocks are accepted
/// at any indices. The conventional layout (text at 0, tool-use at 1) is a
/// special case.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    role: Option<String>,
    text: String,
    kinds: HashMap<u32, BlockKind>,
    tool_uses: BTreeMap<u32, PendingToolUse>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the accumulated state. Returns the fragment to
    /// hand to a live listener, if the event produced one.
    pub fn apply(&mut self, event: ConverseStreamEvent) -> Result<Option<StreamDelta>> {
        match event {
            ConverseStreamEvent::MessageStart(start) => {
                self.role = Some(start.role);
                Ok(None)
            }
            ConverseStreamEvent::ContentBlockStart(start) => {
                if let Some(tool_use) = start.start.tool_use {
                    let index = start.content_block_index;
                    self.kinds.insert(index, BlockKind::ToolUse);
                    self.tool_uses.insert(
                        index,
                        PendingToolUse {
                            tool_use_id: tool_use.tool_use_id,
                            name: tool_use.name,
                            input_buf: String::new(),
                            input: None,
                        },
                    );
                }
                Ok(None)
            }
            ConverseStreamEvent::ContentBlockDelta(delta) => {
                let index = delta.content_block_index;
                if let Some(text) = delta.delta.text {
                    self.kinds.entry(index).or_insert(BlockKind::Text);
                    self.text.push_str(&text);
                    return Ok(Some(StreamDelta::Text(text)));
                }
                if let Some(tool_use) = delta.delta.tool_use {
                    let pending = self.tool_uses.get_mut(&index).ok_or_else(|| {
                        DroverError::Conversion(format!(
                            "tool input delta for unknown content block {index}"
                        ))
                    })?;
                    pending.input_buf.push_str(&tool_use.input);
                    return Ok(Some(StreamDelta::ToolInput(tool_use.input)));
                }
                Ok(None)
            }
            ConverseStreamEvent::ContentBlockStop(stop) => {
                let index = stop.content_block_index;
                if self.kinds.get(&index) == Some(&BlockKind::ToolUse) {
                    let pending = self.tool_uses.get_mut(&index).ok_or_else(|| {
                        DroverError::Conversion(format!(
                            "stop event for unknown tool-use block {index}"
                        ))
                    })?;
                    pending.input = Some(parse_tool_input(&pending.input_buf)?);
                }
                Ok(None)
            }
            ConverseStreamEvent::MessageStop(stop) => {
                self.stop_reason = stop.stop_reason;
                Ok(None)
            }
            ConverseStreamEvent::Metadata(metadata) => {
                if let Some(usage) = metadata.usage {
                    self.usage = Some(usage);
                }
                Ok(None)
            }
        }
    }

    /// Assemble the accumulated state into a canonical completion, through
    /// the same translation used by the non-streaming path.
    pub fn finish(self, cx: &mut ConversionContext) -> Result<ChatCompletion> {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::text(self.text));
        }
        for (_, pending) in self.tool_uses {
            let input = match pending.input {
                Some(input) => input,
                // Stream ended without a stop event for this block.
                None => parse_tool_input(&pending.input_buf)?,
            };
            content.push(ContentBlock::tool_use(ToolUseBlock {
                tool_use_id: pending.tool_use_id,
                name: pending.name,
                input,
            }));
        }

        let response = ConverseResponse {
            output: ConverseOutput {
                message: WireMessage {
                    role: self.role.unwrap_or_else(|| "assistant".to_string()),
                    content,
                },
            },
            stop_reason: self.stop_reason,
            usage: self.usage.unwrap_or_default(),
        };
        Ok(from_converse_response(&response, cx))
    }
}

fn parse_tool_input(buf: &str) -> Result<serde_json::Value> {
    serde_json::from_str(buf)
        .map_err(|e| DroverError::Conversion(format!("invalid streamed tool input JSON: {e}")))
}
