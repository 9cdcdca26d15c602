//! Run outcomes and step-stream events.

use serde::{Deserialize, Serialize};

/// How a run ended. Step-cap exhaustion is a designed termination mode, not
/// an error, and stays distinguishable from model-signaled completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    /// The model signaled completion or the tool loop naturally ended.
    Finished,
    /// The run stopped after `max_steps` steps.
    StepLimit,
}

/// Outcome of a blocking run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub termination: Termination,
    /// Number of steps executed.
    pub steps: u32,
    /// The newest assistant reply (or the fixed fallback).
    pub reply: String,
}

/// One item of a streaming run: text fragments interleaved with step
/// boundaries and a final completion marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    StepStarted { step: u32 },
    TextDelta { text: String },
    ToolInputDelta { text: String },
    StepCompleted { step: u32, summary: String },
    RunCompleted { termination: Termination },
}
