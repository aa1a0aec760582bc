//! Configuration loading from fncall.toml.

use crate::error::{Error, Result};
use connector::{ConnectorOptions, DEFAULT_ENDPOINT, ExecutionSettings, OpenAiBackend};
use policy::FunctionChoice;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub connector: ConnectorOptions,
    pub function_choice: FunctionChoice,
}

/// Where and how to reach the model server.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible server.
    pub endpoint: String,
    pub model: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "phi-3-mini".to_string(),
            api_key: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl Config {
    /// Load `path`, or defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml).map_err(|e| Error::Config(e.to_string()))?;
        config.function_choice.validate()?;
        Ok(config)
    }

    pub fn backend(&self) -> OpenAiBackend {
        let mut builder = OpenAiBackend::builder(&self.backend.model).endpoint(&self.backend.endpoint);
        if let Some(key) = &self.backend.api_key {
            builder = builder.api_key(key);
        }
        if let Some(max_tokens) = self.backend.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.backend.temperature {
            builder = builder.temperature(temperature);
        }
        builder.build()
    }

    /// Settings applied to every chat turn.
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings::default().with_function_choice(self.function_choice.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::Behavior;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.function_choice.behavior, Behavior::Auto);
        assert!(config.connector.secondary_round_trip);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [backend]
            endpoint = "http://127.0.0.1:5000/v1"
            model = "phi-3.5-mini-instruct"
            max_tokens = 512

            [connector]
            chunk_delay_ms = 0

            [function_choice]
            behavior = "required"
            functions = ["time-now"]
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.model, "phi-3.5-mini-instruct");
        assert_eq!(config.backend.max_tokens, Some(512));
        assert_eq!(config.connector.chunk_delay_ms, 0);
        assert_eq!(config.function_choice.behavior, Behavior::Required);
        assert_eq!(config.function_choice.functions, vec!["time-now"]);
    }

    #[test]
    fn inconsistent_choice_is_rejected() {
        let err = Config::parse(
            r#"
            [function_choice]
            behavior = "none"
            functions = ["time-now"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Policy(_)));
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::load("/nonexistent/fncall.toml").unwrap();
        assert_eq!(config.backend.model, "phi-3-mini");
    }
}
