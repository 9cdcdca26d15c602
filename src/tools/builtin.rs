//! Builtin tools.

use async_trait::async_trait;

use crate::error::Result;

use super::result::ToolResult;
use super::tool::Tool;

/// Name of the completion-signal tool the engine treats specially.
pub const TERMINATE_NAME: &str = "terminate";

const TERMINATE_DESCRIPTION: &str = "Terminate the interaction when the request is fulfilled \
or when the assistant cannot proceed further with the task.";

/// Completion signal: calling this tool ends the run.
#[derive(Debug, Default)]
pub struct Terminate {
    parameters: serde_json::Value,
}

impl Terminate {
    pub fn new() -> Self {
        Self {
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "description": "The finish status of the interaction.",
                        "enum": ["success", "failure"],
                    },
                },
                "required": ["status"],
            }),
        }
    }
}

#[async_trait]
impl Tool for Terminate {
    fn name(&self) -> &str {
        TERMINATE_NAME
    }

    fn description(&self) -> &str {
        TERMINATE_DESCRIPTION
    }

    fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let status = args["status"].as_str().unwrap_or("success");
        Ok(ToolResult::ok(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}
