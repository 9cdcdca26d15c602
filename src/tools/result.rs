//! Tool execution results.

use serde::{Deserialize, Serialize};

use crate::error::{DroverError, Result};

/// Result of one tool execution. Fields are independent channels: textual
/// output, an error report, an attached image, and out-of-band system notes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl ToolResult {
    /// Successful result with textual output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    /// Failed result with an error report.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// True when every field is absent or empty.
    pub fn is_empty(&self) -> bool {
        fn blank(field: &Option<String>) -> bool {
            field.as_deref().map_or(true, str::is_empty)
        }
        blank(&self.output)
            && blank(&self.error)
            && blank(&self.base64_image)
            && blank(&self.system)
    }

    /// Combine two results field-wise. `output`, `error` and `system`
    /// concatenate when present on both sides; only one image can be attached
    /// per result, so two non-empty images fail fast.
    pub fn merge(self, other: ToolResult) -> Result<ToolResult> {
        fn concat(a: Option<String>, b: Option<String>) -> Option<String> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a + &b),
                (a, b) => a.or(b),
            }
        }
        let base64_image = match (self.base64_image, other.base64_image) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
                return Err(DroverError::tool("cannot combine two image results"));
            }
            (a, b) => a.filter(|s| !s.is_empty()).or(b),
        };
        Ok(ToolResult {
            output: concat(self.output, other.output),
            error: concat(self.error, other.error),
            base64_image,
            system: concat(self.system, other.system),
        })
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            Some(error) => write!(f, "Error: {error}"),
            None => write!(f, "{}", self.output.as_deref().unwrap_or_default()),
        }
    }
}
