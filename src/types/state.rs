//! Agent execution state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an execution engine.
///
/// Created `Idle`; `Running` while a run is in flight; `Finished` when the
/// model signals completion or the tool loop naturally ends; `Error` on an
/// unrecoverable failure. The resting state after every run is `Idle` so a
/// conversation can be reused.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, strum::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AgentState {
    Idle,
    Running,
    Finished,
    Error,
}
