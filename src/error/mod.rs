//! Error types for drover.

use thiserror::Error;

/// Primary error type for all drover operations.
#[derive(Error, Debug)]
pub enum DroverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A role string outside {system, user, assistant, tool}.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// A message or response that cannot be translated to/from the wire format.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Raised by a tool instead of returning a result. Recoverable at the
    /// engine level: fed back into the conversation as a tool message.
    #[error("Tool error: {message}")]
    Tool { message: String },

    /// State-machine precondition violation (e.g. starting a run while not idle).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Stream error: {0}")]
    Stream(String),
}

impl DroverError {
    /// Create a tool failure with a human-readable message.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DroverError>;
