use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub mod api;
mod client;
pub mod error;
pub mod providers;
pub use api::*;
pub use error::TransportError;

/// Incremental fragments of a streamed completion. An `Err` item means the
/// stream was interrupted or carried an undecodable event.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, TransportError>> + Send>>;

#[derive(Clone, Debug, PartialEq)]
pub struct ModelDefinition {
    pub id: String,
    pub display_name: Option<String>,
    pub context_length: Option<u64>,
}

impl ModelDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            context_length: None,
        }
    }

    pub fn with_display_name(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(display_name.into()),
            context_length: None,
        }
    }

    /// Get the display name, falling back to id if not set
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[async_trait]
pub trait ChatModel {
    fn name(&self) -> &str;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatMessage, TransportError>;

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, TransportError>;
}

// Blanket implementation for Arc<dyn ChatModel> to make it easier to work with
#[async_trait]
impl ChatModel for Arc<dyn ChatModel + Send + Sync> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatMessage, TransportError> {
        (**self).chat(request).await
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, TransportError> {
        (**self).stream_chat(request).await
    }
}

#[async_trait]
pub trait ModelProvider {
    /// List available models from the provider
    async fn list_models(&self) -> Result<Vec<ModelDefinition>, TransportError>;

    /// Create a chat model by name, returned as Arc for sharing across threads
    fn create_chat_model(&self, model_name: &str) -> Option<Arc<dyn ChatModel + Send + Sync>>;
}
