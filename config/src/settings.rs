//! Application settings management

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fs;

/// User defaults stored in settings.toml. Every field is optional; anything
/// left out falls back to the built-in default, and CLI flags override both.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Default model ID (e.g., "openai/gpt-4o-2024-11-20")
    pub default_model: Option<String>,
    /// Gateway base URL, without the /v1 suffix
    pub base_url: Option<String>,
    pub max_history_words: Option<usize>,
    pub max_words_per_message: Option<usize>,
    pub json_mode: Option<bool>,
    pub stream: Option<bool>,
    pub max_retries: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Color used when the client echoes streamed text (e.g., "green")
    pub echo_color: Option<String>,
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };

        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };

        Self::from_toml_str(&content).unwrap_or_default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
