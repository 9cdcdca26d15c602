//! Layered configuration: TOML file overridden by environment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DroverError, Result};
use crate::provider::wire::InferenceConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DroverConfig {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

/// Model endpoint settings (`[llm]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 4096,
            temperature: 1.0,
        }
    }
}

/// Engine settings (`[agent]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_steps: u32,
    pub max_messages: usize,
    pub stuck_threshold: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_messages: 100,
            stuck_threshold: 2,
        }
    }
}

impl DroverConfig {
    /// Parse a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| DroverError::Configuration(e.to_string()))
    }

    /// Defaults overridden by environment variables (loads `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load from a file if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("DROVER_MODEL") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("DROVER_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("DROVER_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(Ok(max_tokens)) = std::env::var("DROVER_MAX_TOKENS").map(|v| v.parse()) {
            self.llm.max_tokens = max_tokens;
        }
        if let Ok(Ok(temperature)) = std::env::var("DROVER_TEMPERATURE").map(|v| v.parse()) {
            self.llm.temperature = temperature;
        }
        if let Ok(Ok(max_steps)) = std::env::var("DROVER_MAX_STEPS").map(|v| v.parse()) {
            self.agent.max_steps = max_steps;
        }
    }

    /// Inference parameters for the wire adapter.
    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig {
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = DroverConfig::default();
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.stuck_threshold, 2);
        assert_eq!(config.agent.max_messages, 100);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[llm]
model = "test-model"
max_tokens = 512

[agent]
max_steps = 5
"#
        )
        .unwrap();

        let config = DroverConfig::from_file(file.path()).unwrap();
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.llm.temperature, 1.0);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.max_messages, 100);
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not [valid toml").unwrap();
        let err = DroverConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, DroverError::Configuration(_)));
    }

    #[test]
    fn inference_mirrors_llm_settings() {
        let mut config = DroverConfig::default();
        config.llm.temperature = 0.2;
        config.llm.max_tokens = 128;
        let inference = config.inference();
        assert_eq!(inference.temperature, 0.2);
        assert_eq!(inference.max_tokens, 128);
    }
}
