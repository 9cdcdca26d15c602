//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::result::ToolResult;

/// Core capability contract. A tool declares an immutable name, description
/// and JSON Schema parameter spec, and either returns a [`ToolResult`] or
/// fails with [`crate::error::DroverError::Tool`] within the caller's step
/// budget. Side effects are tool-specific and unconstrained here.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema describing the named arguments.
    fn parameters(&self) -> &serde_json::Value;

    /// Execute the tool with named arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;

    /// Export format for offering this tool to the model.
    fn to_param(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            },
        })
    }
}

type ToolHandler =
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>>
        + Send
        + Sync;

/// Closure-based tool for quick tool creation.
pub struct FnTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
