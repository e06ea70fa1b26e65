use colored::Color;
use llm::providers::{OPENROUTER_BASE_URL, OpenAIProvider};
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Sent as `HTTP-Referer` and `X-Title` on every gateway request.
pub const APP_REFERER: &str = "https://github.com/maliwansavage/model-choice";
pub const APP_TITLE: &str = "unichat";

/// A secret that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Label used in logs
    pub name: String,
    pub model: String,
    /// Word budget for retained non-system history
    pub max_history_words: usize,
    /// When set (and non-zero), user messages ask the model to answer within
    /// this many words
    pub max_words_per_message: Option<usize>,
    pub json_mode: bool,
    pub stream: bool,
    /// Total attempts per turn, at least 1
    pub max_retries: u32,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub retry_delay: Duration,
    pub api_key: Option<ApiKey>,
    /// Consulted when `api_key` is not given
    pub api_key_env: String,
    /// Gateway base URL used by [`ChatClient::connect`](crate::ChatClient::connect)
    pub base_url: Option<String>,
    /// Sent with every completion request
    pub extra_headers: Vec<(String, String)>,
    pub echo_color: Color,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            name: "Unified Apis".to_string(),
            model: "openai/gpt-3.5-turbo".to_string(),
            max_history_words: 20_000,
            max_words_per_message: None,
            json_mode: false,
            stream: true,
            max_retries: 10,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            retry_delay: Duration::from_secs(1),
            api_key: None,
            api_key_env: config::DEFAULT_API_KEY_ENV.to_string(),
            base_url: None,
            extra_headers: Vec::new(),
            echo_color: Color::Green,
        }
    }
}

impl ClientConfig {
    pub fn new(model: impl Into<String>) -> Self {
        ClientConfig {
            model: model.into(),
            ..Default::default()
        }
    }

    /// The explicit key if present, otherwise the one in `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<ApiKey, ConfigError> {
        config::resolve_api_key(self.api_key.as_ref().map(ApiKey::expose), &self.api_key_env)
            .map(ApiKey)
            .ok_or_else(|| ConfigError::MissingApiKey {
                env_var: self.api_key_env.clone(),
            })
    }

    /// The gateway this config points at (OpenRouter unless `base_url` says
    /// otherwise), authenticated with the resolved key.
    pub fn provider(&self) -> Result<OpenAIProvider, ConfigError> {
        let api_key = self.resolve_api_key()?;
        let base_url = self.base_url.as_deref().unwrap_or(OPENROUTER_BASE_URL);
        Ok(OpenAIProvider::with_attribution(
            base_url,
            api_key.expose(),
            APP_REFERER,
            APP_TITLE,
        )?)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidRetryBound);
        }
        self.resolve_api_key().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> ClientConfig {
        ClientConfig {
            api_key: Some(ApiKey::new("sk-test")),
            api_key_env: "UNICHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ClientConfig::new("openai/gpt-4o")
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.max_history_words, 20_000);
        assert!(config.stream);
        assert!(!config.json_mode);
        assert_eq!(config.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn test_api_key_is_redacted() {
        let rendered = format!("{:?}", keyed());
        assert!(rendered.contains("ApiKey(***)"));
        assert!(!rendered.contains("sk-test"));
    }

    #[test]
    fn test_provider_needs_a_usable_key() {
        assert!(keyed().provider().is_ok());

        let no_key = ClientConfig { api_key: None, ..keyed() };
        assert!(matches!(no_key.provider(), Err(ConfigError::MissingApiKey { .. })));

        let bad_key = ClientConfig {
            api_key: Some(ApiKey::new("sk-bad\nkey")),
            ..keyed()
        };
        assert!(matches!(bad_key.provider(), Err(ConfigError::Transport(_))));
    }

    #[test]
    fn test_validate() {
        assert!(keyed().validate().is_ok());

        let no_retries = ClientConfig { max_retries: 0, ..keyed() };
        assert!(matches!(no_retries.validate(), Err(ConfigError::InvalidRetryBound)));

        let no_model = ClientConfig { model: " ".to_string(), ..keyed() };
        assert!(matches!(no_model.validate(), Err(ConfigError::EmptyModel)));

        let no_key = ClientConfig { api_key: None, ..keyed() };
        match no_key.validate() {
            Err(ConfigError::MissingApiKey { env_var }) => {
                assert_eq!(env_var, "UNICHAT_TEST_KEY_THAT_IS_NEVER_SET")
            }
            other => panic!("expected missing key, got {other:?}"),
        }
    }
}
