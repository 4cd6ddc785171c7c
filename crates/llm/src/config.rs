use std::sync::Arc;

use moneta_common::{MonetaError, Result};
use serde::{Deserialize, Serialize};

use crate::client::LlmClient;
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: None,
            max_tokens: None,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// The configured key wins; otherwise fall back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let base_client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" => Box::new(OpenAiClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.resolve_api_key(),
        )),
        other => {
            return Err(MonetaError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    Ok(Arc::new(RetryingClient::new(
        base_client,
        config.retry.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "openai"
model = "gpt-4o-mini"
api_url = "http://localhost:11434"

[retry]
max_retries = 5
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 3.0
"#;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert!(config.api_key.is_none());
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn deserialize_config_defaults() {
        let config: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }

    #[test]
    fn explicit_api_key_wins_over_environment() {
        let config = LlmConfig {
            api_key: Some("sk-from-config".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-from-config"));
    }

    #[test]
    fn build_openai_client() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let client = build_llm_client(&config).unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            model: "gemini-pro".to_string(),
            ..LlmConfig::default()
        };
        assert!(build_llm_client(&config).is_err());
    }
}
