//! Pure translation between the canonical model and the Converse wire format.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{DroverError, Result};
use crate::types::{
    ChatCompletion, Choice, CompletionMessage, CompletionUsage, Message, Role, ToolCall,
};

use super::wire::{
    ContentBlock, ConverseRequest, ConverseResponse, InferenceConfig, InputSchema, SystemBlock,
    ToolConfig, ToolResultBlock, ToolResultContent, ToolSpec, ToolSpecEntry, ToolUseBlock,
    WireMessage,
};

/// Placeholder emitted when a response carries no text content, so downstream
/// consumers always see a non-empty assistant reply.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = ".";

/// Correlation state threaded through one conversation's conversion passes.
///
/// The wire format identifies a tool result by the id of the tool use that
/// produced it; this context carries the most recently seen tool-use id from
/// an assistant turn (or a parsed response) to the following tool message.
/// One context per conversation; never shared across conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    pub current_tool_use_id: Option<String>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Translate canonical messages and tool declarations into a request body.
///
/// The last system message wins as the backend system prompt. An assistant
/// turn contributes its text (if any) followed by one tool-use item built
/// from its first tool call; the wire format supports one tool invocation per
/// turn on the request side. A tool message folds into the user channel as a
/// tool-result item correlated by the id recorded in `cx`, not by the
/// message's own `tool_call_id` — correct as long as each call/result pair is
/// adjacent.
pub fn to_converse_request(
    messages: &[Message],
    tools: &[serde_json::Value],
    inference_config: InferenceConfig,
    cx: &mut ConversionContext,
) -> Result<ConverseRequest> {
    let mut system = Vec::new();
    let mut wire_messages = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                system = vec![SystemBlock {
                    text: message.content.clone().unwrap_or_default(),
                }];
            }
            Role::User => {
                wire_messages.push(WireMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::text(
                        message.content.clone().unwrap_or_default(),
                    )],
                });
            }
            Role::Assistant => {
                let mut content = Vec::new();
                if let Some(ref text) = message.content {
                    content.push(ContentBlock::text(text.clone()));
                }
                if let Some(call) = message.tool_calls.as_ref().and_then(|calls| calls.first()) {
                    let input: serde_json::Value = serde_json::from_str(&call.function.arguments)
                        .map_err(|e| {
                        DroverError::Conversion(format!(
                            "tool call '{}' carries unparseable arguments: {e}",
                            call.id
                        ))
                    })?;
                    content.push(ContentBlock::tool_use(ToolUseBlock {
                        tool_use_id: call.id.clone(),
                        name: call.function.name.clone(),
                        input,
                    }));
                    cx.current_tool_use_id = Some(call.id.clone());
                }
                wire_messages.push(WireMessage {
                    role: "assistant".to_string(),
                    content,
                });
            }
            Role::Tool => {
                let tool_use_id = cx.current_tool_use_id.clone().ok_or_else(|| {
                    DroverError::Conversion(
                        "tool message without a preceding tool call".to_string(),
                    )
                })?;
                wire_messages.push(WireMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::tool_result(ToolResultBlock {
                        tool_use_id,
                        content: vec![ToolResultContent {
                            text: message.content.clone().unwrap_or_default(),
                        }],
                    })],
                });
            }
        }
    }

    let tool_config = {
        let specs = tool_specs(tools);
        (!specs.is_empty()).then_some(ToolConfig { tools: specs })
    };

    Ok(ConverseRequest {
        system,
        messages: wire_messages,
        inference_config,
        tool_config,
    })
}

/// Convert `{type:"function", function:{...}}` declarations into toolSpec
/// entries. Declarations without the function marker are silently dropped.
pub fn tool_specs(tools: &[serde_json::Value]) -> Vec<ToolSpecEntry> {
    tools
        .iter()
        .filter(|tool| tool.get("type").and_then(|t| t.as_str()) == Some("function"))
        .map(|tool| {
            let function = &tool["function"];
            ToolSpecEntry {
                tool_spec: ToolSpec {
                    name: function["name"].as_str().unwrap_or_default().to_string(),
                    description: function["description"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    input_schema: InputSchema {
                        json: serde_json::json!({
                            "type": "object",
                            "properties": function["parameters"]
                                .get("properties")
                                .cloned()
                                .unwrap_or_else(|| serde_json::json!({})),
                            "required": function["parameters"]
                                .get("required")
                                .cloned()
                                .unwrap_or_else(|| serde_json::json!([])),
                        }),
                    },
                },
            }
        })
        .collect()
}

/// Translate a backend response into the canonical completion envelope.
///
/// All text items concatenate into the reply (placeholder when empty); every
/// tool-use item becomes a canonical [`ToolCall`] and the last one's id is
/// recorded in `cx` for the following request pass.
pub fn from_converse_response(
    response: &ConverseResponse,
    cx: &mut ConversionContext,
) -> ChatCompletion {
    let message = &response.output.message;

    let mut content: String = message
        .content
        .iter()
        .filter_map(|block| block.text.as_deref())
        .collect();
    if content.is_empty() {
        content = EMPTY_CONTENT_PLACEHOLDER.to_string();
    }

    let mut tool_calls = Vec::new();
    for block in &message.content {
        if let Some(ref tool_use) = block.tool_use {
            cx.current_tool_use_id = Some(tool_use.tool_use_id.clone());
            tool_calls.push(ToolCall::function(
                tool_use.tool_use_id.clone(),
                tool_use.name.clone(),
                tool_use.input.to_string(),
            ));
        }
    }

    let role = if message.role.is_empty() {
        "assistant".to_string()
    } else {
        message.role.clone()
    };

    ChatCompletion {
        id: format!("chatcmpl-{}", Uuid::new_v4()),
        created: Utc::now().timestamp(),
        object: "chat.completion".to_string(),
        choices: vec![Choice {
            finish_reason: response
                .stop_reason
                .clone()
                .unwrap_or_else(|| "end_turn".to_string()),
            index: 0,
            message: CompletionMessage {
                content,
                role,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                function_call: None,
            },
        }],
        usage: CompletionUsage {
            completion_tokens: response.usage.output_tokens,
            prompt_tokens: response.usage.input_tokens,
            total_tokens: response.usage.total_tokens,
        },
    }
}
