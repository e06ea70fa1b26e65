use crate::client::{Client, header_map};
use crate::error::TransportError;
use crate::{ChatModel, ModelDefinition, ModelProvider};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;

use super::chat::api::ListModelsResponse;
use super::chat::OpenAIChatModel;

/// Any gateway speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
}

const API_VERSION: &str = "v1";

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";

impl OpenAIProvider {
    pub fn openrouter(api_key: &str) -> Result<Self, TransportError> {
        Self::new(OPENROUTER_BASE_URL, api_key)
    }

    /// Create a provider with a custom base URL (e.g., for proxying).
    /// The API version path (/v1) is automatically appended.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TransportError> {
        Self::with_headers(base_url, api_key, &[])
    }

    /// Like [`OpenAIProvider::new`], with `HTTP-Referer` and `X-Title` sent on
    /// every request so the gateway can attribute traffic to the app.
    pub fn with_attribution(
        base_url: &str,
        api_key: &str,
        referer: &str,
        title: &str,
    ) -> Result<Self, TransportError> {
        Self::with_headers(
            base_url,
            api_key,
            &[("HTTP-Referer", referer), ("X-Title", title)],
        )
    }

    fn with_headers(
        base_url: &str,
        api_key: &str,
        extra: &[(&str, &str)],
    ) -> Result<Self, TransportError> {
        let bearer = format!("Bearer {}", api_key);
        let headers = header_map(
            [
                (CONTENT_TYPE.as_str(), "application/json"),
                (AUTHORIZATION.as_str(), bearer.as_str()),
            ]
            .into_iter()
            .chain(extra.iter().copied()),
        )?;

        let base_url = base_url.trim_end_matches('/');
        Ok(OpenAIProvider {
            client: Client::with_headers(headers)?,
            base_url: format!("{}/{}", base_url, API_VERSION),
        })
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn list_models(&self) -> Result<Vec<ModelDefinition>, TransportError> {
        let response: ListModelsResponse = self.client.get(self.models_url()).await?;
        Ok(response.data.into_iter().map(|m| m.into()).collect())
    }

    fn create_chat_model(&self, model_name: &str) -> Option<Arc<dyn ChatModel + Send + Sync>> {
        Some(Arc::new(OpenAIChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            model_name.to_string(),
        )))
    }
}
