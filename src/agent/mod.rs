//! Execution engine, run events and keyed sessions.

pub mod engine;
pub mod events;
pub mod sessions;

pub use engine::{Engine, FALLBACK_REPLY, STUCK_PROMPT};
pub use events::{RunSummary, StepEvent, Termination};
pub use sessions::{EngineHandle, Sessions};
