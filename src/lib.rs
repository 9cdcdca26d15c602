//! Drover is a tool-calling agent runtime: a canonical message model, a
//! Converse-shaped wire adapter, and a bounded step-execution engine that
//! drives a model through think/act cycles until it signals completion.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use drover::agent::Engine;
//! use drover::config::DroverConfig;
//! use drover::provider::HttpConverseClient;
//! use drover::tools::Terminate;
//!
//! # async fn demo() -> drover::error::Result<()> {
//! let config = DroverConfig::from_env();
//! let client = Arc::new(HttpConverseClient::new(
//!     &config.llm.model,
//!     config.llm.api_key.clone().unwrap_or_default(),
//!     config.llm.base_url.clone(),
//! ));
//! let mut engine = Engine::from_config(client, &config)
//!     .with_system_prompt("You are a helpful assistant.")
//!     .with_tool(Arc::new(Terminate::new()));
//!
//! let summary = engine.run("What's the weather like?").await?;
//! println!("{}", summary.reply);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod provider;
pub mod tools;
pub mod types;

pub use agent::{Engine, RunSummary, Sessions, StepEvent, Termination};
pub use error::{DroverError, Result};
pub use provider::{HttpConverseClient, ModelClient};
pub use tools::{Tool, ToolResult};
pub use types::{AgentState, Memory, Message, Role, ToolCall};
