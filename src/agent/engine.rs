//! The step-execution engine: a bounded, observable think/act loop.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::{DroverError, Result};
use crate::provider::wire::{ConverseRequest, InferenceConfig};
use crate::provider::{convert, ConversionContext, ModelClient, StreamAssembler, StreamDelta};
use crate::tools::{ToolResult, TERMINATE_NAME};
use crate::types::{AgentState, ChatCompletion, Memory, Message, Role, ToolCall};

use super::events::{RunSummary, StepEvent, Termination};

/// Reply used when a finished run left no assistant content behind.
pub const FALLBACK_REPLY: &str = "Sorry, I was unable to generate a reply.";

/// Directive injected when the engine detects it is stuck.
pub const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid \
repeating ineffective paths already attempted.";

/// One engine instance drives one conversation. Not safe for concurrent use:
/// `state`, `current_step` and `memory` are mutated in place with no internal
/// locking — hold exactly one instance per conversation key (see
/// [`super::sessions::Sessions`]).
pub struct Engine {
    client: Arc<dyn ModelClient>,
    tools: Vec<Arc<dyn crate::tools::Tool>>,
    system_prompt: Option<String>,
    inference: InferenceConfig,
    state: AgentState,
    memory: Memory,
    cx: ConversionContext,
    current_step: u32,
    max_steps: u32,
    stuck_threshold: usize,
}

impl Engine {
    /// Create an engine with default settings.
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        let defaults = crate::config::AgentSettings::default();
        Self {
            client,
            tools: Vec::new(),
            system_prompt: None,
            inference: InferenceConfig::default(),
            state: AgentState::Idle,
            memory: Memory::new(defaults.max_messages),
            cx: ConversionContext::new(),
            current_step: 0,
            max_steps: defaults.max_steps,
            stuck_threshold: defaults.stuck_threshold,
        }
    }

    /// Create an engine configured from a [`crate::config::DroverConfig`].
    pub fn from_config(client: Arc<dyn ModelClient>, config: &crate::config::DroverConfig) -> Self {
        Self::new(client)
            .with_inference(config.inference())
            .with_max_steps(config.agent.max_steps)
            .with_stuck_threshold(config.agent.stuck_threshold)
            .with_memory_limit(config.agent.max_messages)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn crate::tools::Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn crate::tools::Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Tune the duplicate-content threshold for stuck detection.
    pub fn with_stuck_threshold(mut self, threshold: usize) -> Self {
        self.stuck_threshold = threshold;
        self
    }

    pub fn with_memory_limit(mut self, max_messages: usize) -> Self {
        self.memory = Memory::new(max_messages);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Replace memory with a conversation's prior messages, in original
    /// order. The caller passes the just-submitted user input to [`run`]
    /// separately, not here.
    ///
    /// [`run`]: Engine::run
    pub fn load_history(&mut self, messages: Vec<Message>) {
        self.memory.clear();
        self.memory.add_messages(messages);
    }

    /// The newest assistant reply, or a fixed fallback when none exists.
    pub fn reply(&self) -> String {
        self.memory
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.content.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }

    /// Run to completion: repeated steps until the model signals completion
    /// or the step cap is reached. The engine always comes to rest in
    /// `Idle`, whatever the outcome.
    pub async fn run(&mut self, user_input: impl Into<String>) -> Result<RunSummary> {
        if self.state != AgentState::Idle {
            return Err(DroverError::InvalidState(format!(
                "cannot start a run from state {}",
                self.state
            )));
        }
        self.state = AgentState::Running;
        self.memory.add_message(Message::user(user_input));

        let outcome = self.run_loop().await;
        if let Err(ref e) = outcome {
            self.state = AgentState::Error;
            warn!(error = %e, "run failed");
        }
        let steps = self.current_step;
        self.current_step = 0;
        self.state = AgentState::Idle;

        outcome.map(|termination| RunSummary {
            termination,
            steps,
            reply: self.reply(),
        })
    }

    async fn run_loop(&mut self) -> Result<Termination> {
        while self.current_step < self.max_steps && self.state != AgentState::Finished {
            let summary = self.step().await?;
            debug!(step = self.current_step, %summary, "step complete");
            if self.is_stuck() {
                self.handle_stuck();
            }
        }
        if self.state == AgentState::Finished {
            Ok(Termination::Finished)
        } else {
            warn!(max_steps = self.max_steps, "run stopped at step limit");
            Ok(Termination::StepLimit)
        }
    }

    /// One think/act cycle: call the model, execute any requested tools,
    /// feed results back. Returns a human-readable summary of the step.
    pub async fn step(&mut self) -> Result<String> {
        self.current_step += 1;
        let request = self.build_request()?;
        let response = self.client.converse(&request).await?;
        let completion = convert::from_converse_response(&response, &mut self.cx);
        self.absorb(completion).await
    }

    fn build_request(&mut self) -> Result<ConverseRequest> {
        let mut messages = Vec::with_capacity(self.memory.len() + 1);
        if let Some(ref prompt) = self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.memory.messages().iter().cloned());

        let tools: Vec<serde_json::Value> = self.tools.iter().map(|t| t.to_param()).collect();
        convert::to_converse_request(&messages, &tools, self.inference.clone(), &mut self.cx)
    }

    /// Fold one completion into memory, executing requested tools.
    async fn absorb(&mut self, completion: ChatCompletion) -> Result<String> {
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| DroverError::Conversion("completion carried no choices".to_string()))?;

        match message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                self.memory
                    .add_message(Message::from_tool_calls(calls.clone(), message.content));
                let mut notes = Vec::with_capacity(calls.len());
                for call in &calls {
                    notes.push(self.execute_call(call).await);
                }
                Ok(notes.join("; "))
            }
            _ => {
                // A direct reply ends the turn.
                self.state = AgentState::Finished;
                self.memory
                    .add_message(Message::assistant(message.content.clone()));
                Ok(message.content)
            }
        }
    }

    /// Execute one tool call. Unknown tools and tool failures become error
    /// results fed back into the conversation, never a run abort.
    async fn execute_call(&mut self, call: &ToolCall) -> String {
        let name = &call.function.name;
        debug!(tool = %name, id = %call.id, "executing tool call");

        let tool = self.tools.iter().find(|t| t.name() == *name).cloned();
        let result = match serde_json::from_str::<serde_json::Value>(&call.function.arguments) {
            Ok(args) => match tool {
                Some(tool) => match tool.execute(args).await {
                    Ok(result) => result,
                    Err(DroverError::Tool { message }) => ToolResult::error(message),
                    Err(e) => ToolResult::error(e.to_string()),
                },
                None => ToolResult::error(format!("unknown tool '{name}'")),
            },
            Err(e) => ToolResult::error(format!("invalid tool arguments: {e}")),
        };

        if name == TERMINATE_NAME {
            self.state = AgentState::Finished;
        }

        let summary = match result.error {
            Some(_) => format!("tool '{name}' failed"),
            None => format!("tool '{name}' completed"),
        };
        let base64_image = result.base64_image.clone();
        self.memory.add_message(Message::tool(
            result.to_string(),
            name.clone(),
            call.id.clone(),
            base64_image,
        ));
        summary
    }

    /// Stuck when the newest assistant content repeats earlier assistant
    /// content at least `stuck_threshold` times.
    fn is_stuck(&self) -> bool {
        let messages = self.memory.messages();
        let Some(position) = messages.iter().rposition(|m| m.role == Role::Assistant) else {
            return false;
        };
        let Some(content) = messages[position].content.as_deref().filter(|c| !c.is_empty())
        else {
            return false;
        };
        let duplicates = messages[..position]
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content.as_deref() == Some(content))
            .count();
        duplicates >= self.stuck_threshold
    }

    /// Nudge, not a fatal condition: inject a strategy-change directive and
    /// keep looping.
    fn handle_stuck(&mut self) {
        warn!("duplicate assistant responses detected, injecting strategy-change directive");
        let directive = match self.system_prompt {
            Some(ref prompt) => format!("{STUCK_PROMPT}\n{prompt}"),
            None => STUCK_PROMPT.to_string(),
        };
        self.memory.add_message(Message::system(directive));
    }

    /// Streaming run: the same state machine, producing a lazy, ordered,
    /// single-consumer sequence of text fragments interleaved with step
    /// boundaries and a completion marker. Dropping the stream mid-run
    /// leaves the engine state undefined.
    pub fn run_stream(
        &mut self,
        user_input: impl Into<String>,
    ) -> impl Stream<Item = Result<StepEvent>> + '_ {
        let input: String = user_input.into();
        async_stream::stream! {
            if self.state != AgentState::Idle {
                yield Err(DroverError::InvalidState(format!(
                    "cannot start a run from state {}",
                    self.state
                )));
                return;
            }
            self.state = AgentState::Running;
            self.memory.add_message(Message::user(input));

            let mut failure: Option<DroverError> = None;
            'run: while self.current_step < self.max_steps && self.state != AgentState::Finished {
                self.current_step += 1;
                let step = self.current_step;
                yield Ok(StepEvent::StepStarted { step });

                let request = match self.build_request() {
                    Ok(request) => request,
                    Err(e) => {
                        failure = Some(e);
                        break 'run;
                    }
                };
                let mut events = match self.client.converse_stream(&request).await {
                    Ok(events) => events,
                    Err(e) => {
                        failure = Some(e);
                        break 'run;
                    }
                };

                let mut assembler = StreamAssembler::new();
                while let Some(event) = events.next().await {
                    match event.and_then(|event| assembler.apply(event)) {
                        Ok(Some(StreamDelta::Text(text))) => {
                            yield Ok(StepEvent::TextDelta { text });
                        }
                        Ok(Some(StreamDelta::ToolInput(text))) => {
                            yield Ok(StepEvent::ToolInputDelta { text });
                        }
                        Ok(None) => {}
                        Err(e) => {
                            failure = Some(e);
                            break 'run;
                        }
                    }
                }

                let completion = match assembler.finish(&mut self.cx) {
                    Ok(completion) => completion,
                    Err(e) => {
                        failure = Some(e);
                        break 'run;
                    }
                };
                match self.absorb(completion).await {
                    Ok(summary) => {
                        debug!(step, %summary, "step complete");
                        yield Ok(StepEvent::StepCompleted { step, summary });
                    }
                    Err(e) => {
                        failure = Some(e);
                        break 'run;
                    }
                }
                if self.is_stuck() {
                    self.handle_stuck();
                }
            }

            let finished = self.state == AgentState::Finished;
            self.current_step = 0;
            self.state = AgentState::Idle;

            match failure {
                Some(e) => yield Err(e),
                None => {
                    let termination = if finished {
                        Termination::Finished
                    } else {
                        warn!(max_steps = self.max_steps, "run stopped at step limit");
                        Termination::StepLimit
                    };
                    yield Ok(StepEvent::RunCompleted { termination });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::wire::{
        ContentBlock, ConverseOutput, ConverseResponse, ToolUseBlock, WireMessage,
    };
    use crate::provider::EventStream;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn text_response(text: &str) -> ConverseResponse {
        ConverseResponse {
            output: ConverseOutput {
                message: WireMessage {
                    role: "assistant".into(),
                    content: vec![ContentBlock::text(text)],
                },
            },
            stop_reason: Some("end_turn".into()),
            usage: Default::default(),
        }
    }

    fn tool_response(text: &str, id: &str, name: &str) -> ConverseResponse {
        ConverseResponse {
            output: ConverseOutput {
                message: WireMessage {
                    role: "assistant".into(),
                    content: vec![
                        ContentBlock::text(text),
                        ContentBlock::tool_use(ToolUseBlock {
                            tool_use_id: id.into(),
                            name: name.into(),
                            input: serde_json::json!({}),
                        }),
                    ],
                },
            },
            stop_reason: Some("tool_use".into()),
            usage: Default::default(),
        }
    }

    /// Replays a fixed script of responses; repeats the last one when the
    /// script runs out.
    struct ScriptedClient {
        responses: Mutex<VecDeque<ConverseResponse>>,
        last: ConverseResponse,
    }

    impl ScriptedClient {
        fn new(responses: Vec<ConverseResponse>) -> Arc<Self> {
            let last = responses
                .last()
                .cloned()
                .unwrap_or_else(|| text_response("done"));
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                last,
            })
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn converse(&self, _request: &ConverseRequest) -> Result<ConverseResponse> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.clone()))
        }

        async fn converse_stream(&self, _request: &ConverseRequest) -> Result<EventStream> {
            Err(DroverError::Stream("not scripted".into()))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ModelClient for FailingClient {
        async fn converse(&self, _request: &ConverseRequest) -> Result<ConverseResponse> {
            Err(DroverError::api(500, "backend down"))
        }

        async fn converse_stream(&self, _request: &ConverseRequest) -> Result<EventStream> {
            Err(DroverError::api(500, "backend down"))
        }
    }

    #[tokio::test]
    async fn direct_reply_finishes_in_one_step() {
        let client = ScriptedClient::new(vec![text_response("hello there")]);
        let mut engine = Engine::new(client);
        let summary = engine.run("hi").await.unwrap();

        assert_eq!(summary.termination, Termination::Finished);
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.reply, "hello there");
        assert_eq!(engine.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn step_cap_ends_run_and_returns_to_idle() {
        // The model keeps requesting an unknown tool and never finishes.
        let client = ScriptedClient::new(vec![
            tool_response("looking", "c1", "search"),
            tool_response("still looking", "c2", "search"),
        ]);
        let mut engine = Engine::new(client).with_max_steps(2);
        let summary = engine.run("find it").await.unwrap();

        assert_eq!(summary.termination, Termination::StepLimit);
        assert_eq!(summary.steps, 2);
        assert_eq!(engine.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn run_rejected_unless_idle() {
        let client = ScriptedClient::new(vec![text_response("ok")]);
        let mut engine = Engine::new(client);
        engine.state = AgentState::Running;
        let err = engine.run("hi").await.unwrap_err();
        assert!(matches!(err, DroverError::InvalidState(_)));
    }

    #[tokio::test]
    async fn failure_resets_state_to_idle() {
        let mut engine = Engine::new(Arc::new(FailingClient));
        let err = engine.run("hi").await.unwrap_err();
        assert!(matches!(err, DroverError::Api { status: 500, .. }));
        assert_eq!(engine.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn repeated_content_triggers_exactly_one_nudge() {
        // Three identical assistant turns, all requesting a tool so the loop
        // keeps going, then a final direct reply.
        let client = ScriptedClient::new(vec![
            tool_response("same plan", "c1", "noop"),
            tool_response("same plan", "c2", "noop"),
            tool_response("same plan", "c3", "noop"),
            text_response("done"),
        ]);
        let mut engine = Engine::new(client).with_max_steps(10);
        let summary = engine.run("go").await.unwrap();

        assert_eq!(summary.termination, Termination::Finished);
        let nudges = engine
            .memory()
            .messages()
            .iter()
            .filter(|m| {
                m.role == Role::System
                    && m.content
                        .as_deref()
                        .is_some_and(|c| c.starts_with(STUCK_PROMPT))
            })
            .count();
        assert_eq!(nudges, 1);
    }

    #[tokio::test]
    async fn terminate_tool_finishes_the_run() {
        let client = ScriptedClient::new(vec![tool_response("wrapping up", "c1", TERMINATE_NAME)]);
        let mut engine = Engine::new(client)
            .with_tool(Arc::new(crate::tools::Terminate::new()))
            .with_max_steps(5);
        let summary = engine.run("finish").await.unwrap();

        assert_eq!(summary.termination, Termination::Finished);
        assert_eq!(summary.steps, 1);
    }

    #[tokio::test]
    async fn tool_messages_echo_the_call_id() {
        let client = ScriptedClient::new(vec![
            tool_response("calling", "c42", "noop"),
            text_response("done"),
        ]);
        let mut engine = Engine::new(client).with_max_steps(3);
        engine.run("go").await.unwrap();

        let tool_msg = engine
            .memory()
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c42"));
        assert_eq!(tool_msg.name.as_deref(), Some("noop"));
        // Unknown tool became an error result, not an abort.
        assert!(tool_msg.content.as_deref().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn load_history_rehydrates_memory() {
        let client = ScriptedClient::new(vec![text_response("recalled")]);
        let mut engine = Engine::new(client);
        engine.load_history(vec![
            Message::user("earlier question"),
            Message::assistant("earlier answer"),
        ]);
        assert_eq!(engine.memory().len(), 2);
        assert_eq!(engine.reply(), "earlier answer");

        engine.run("follow-up").await.unwrap();
        assert_eq!(engine.reply(), "recalled");
    }

    #[test]
    fn reply_falls_back_when_no_assistant_message() {
        let client = ScriptedClient::new(vec![]);
        let engine = Engine::new(client);
        assert_eq!(engine.reply(), FALLBACK_REPLY);
    }
}
