#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use drover::error::{DroverError, Result};
use drover::provider::wire::{
    BlockDelta, BlockStart, ContentBlock, ContentBlockDeltaEvent, ContentBlockStartEvent,
    ContentBlockStopEvent, ConverseOutput, ConverseRequest, ConverseResponse, ConverseStreamEvent,
    MessageStartEvent, MessageStopEvent, ToolUseBlock, ToolUseDelta, ToolUseStart, WireMessage,
    WireUsage,
};
use drover::provider::{EventStream, ModelClient};

/// Replays fixed scripts of responses or stream-event sequences, recording
/// every request it receives.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<ConverseResponse>>,
    streams: Mutex<VecDeque<Vec<ConverseStreamEvent>>>,
    pub requests: Mutex<Vec<ConverseRequest>>,
}

impl ScriptedClient {
    pub fn with_responses(responses: Vec<ConverseResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_streams(streams: Vec<Vec<ConverseStreamEvent>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            streams: Mutex::new(streams.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn recorded_requests(&self) -> Vec<ConverseRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DroverError::api(500, "response script exhausted"))
    }

    async fn converse_stream(&self, request: &ConverseRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request.clone());
        let events = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DroverError::api(500, "stream script exhausted"))?;
        Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

pub fn text_response(text: &str) -> ConverseResponse {
    ConverseResponse {
        output: ConverseOutput {
            message: WireMessage {
                role: "assistant".into(),
                content: vec![ContentBlock::text(text)],
            },
        },
        stop_reason: Some("end_turn".into()),
        usage: WireUsage::default(),
    }
}

pub fn tool_response(text: &str, id: &str, name: &str, input: serde_json::Value) -> ConverseResponse {
    ConverseResponse {
        output: ConverseOutput {
            message: WireMessage {
                role: "assistant".into(),
                content: vec![
                    ContentBlock::text(text),
                    ContentBlock::tool_use(ToolUseBlock {
                        tool_use_id: id.into(),
                        name: name.into(),
                        input,
                    }),
                ],
            },
        },
        stop_reason: Some("tool_use".into()),
        usage: WireUsage::default(),
    }
}

/// A streamed direct reply, one text delta per fragment.
pub fn text_stream(fragments: &[&str]) -> Vec<ConverseStreamEvent> {
    let mut events = vec![ConverseStreamEvent::MessageStart(MessageStartEvent {
        role: "assistant".into(),
    })];
    for fragment in fragments {
        events.push(ConverseStreamEvent::ContentBlockDelta(
            ContentBlockDeltaEvent {
                content_block_index: 0,
                delta: BlockDelta {
                    text: Some((*fragment).into()),
                    tool_use: None,
                },
            },
        ));
    }
    events.push(ConverseStreamEvent::ContentBlockStop(
        ContentBlockStopEvent {
            content_block_index: 0,
        },
    ));
    events.push(ConverseStreamEvent::MessageStop(MessageStopEvent {
        stop_reason: Some("end_turn".into()),
    }));
    events
}

/// A streamed tool call with the argument JSON split into fragments.
pub fn tool_stream(id: &str, name: &str, input_fragments: &[&str]) -> Vec<ConverseStreamEvent> {
    let mut events = vec![
        ConverseStreamEvent::MessageStart(MessageStartEvent {
            role: "assistant".into(),
        }),
        ConverseStreamEvent::ContentBlockStart(ContentBlockStartEvent {
            content_block_index: 1,
            start: BlockStart {
                tool_use: Some(ToolUseStart {
                    tool_use_id: id.into(),
                    name: name.into(),
                }),
            },
        }),
    ];
    for fragment in input_fragments {
        events.push(ConverseStreamEvent::ContentBlockDelta(
            ContentBlockDeltaEvent {
                content_block_index: 1,
                delta: BlockDelta {
                    text: None,
                    tool_use: Some(ToolUseDelta {
                        input: (*fragment).into(),
                    }),
                },
            },
        ));
    }
    events.push(ConverseStreamEvent::ContentBlockStop(
        ContentBlockStopEvent {
            content_block_index: 1,
        },
    ));
    events.push(ConverseStreamEvent::MessageStop(MessageStopEvent {
        stop_reason: Some("tool_use".into()),
    }));
    events
}
