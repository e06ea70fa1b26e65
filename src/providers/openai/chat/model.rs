use crate::api::{ChatChunk, ChatMessage, ChatRequest, Role};
use crate::client::{Client, StreamLine, header_map};
use crate::error::TransportError;
use crate::ChatModel;
use crate::ChatStream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderMap;

use super::api::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};

#[derive(Clone)]
pub struct OpenAIChatModel {
    client: Client,
    base_url: String,
    model_name: String,
}

impl OpenAIChatModel {
    pub fn new(client: Client, base_url: String, model_name: String) -> Self {
        OpenAIChatModel {
            client,
            base_url,
            model_name,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_headers(request: &ChatRequest) -> Result<HeaderMap, TransportError> {
        header_map(
            request
                .options
                .extra_headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }
}

/// Classify an SSE line: `data:` payloads are events, everything else is skipped.
fn sse_data(line: &str) -> StreamLine<'_> {
    let Some(json_str) = line.trim().strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    // OpenAI sends "data: [DONE]" as the final message
    match json_str.trim_start() {
        "[DONE]" => StreamLine::Done,
        payload => StreamLine::Event(payload),
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatMessage, TransportError> {
        let openai_request =
            ChatCompletionRequest::from_request(self.model_name.clone(), request, false);
        let response: ChatCompletionResponse = self
            .client
            .post(self.chat_url(), &openai_request, Self::request_headers(request)?)
            .await?;
        response.into_message().ok_or(TransportError::EmptyResponse)
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, TransportError> {
        let openai_request =
            ChatCompletionRequest::from_request(self.model_name.clone(), request, true);

        let stream = self
            .client
            .post_stream::<_, _, _, ChatCompletionChunk>(
                self.chat_url(),
                &openai_request,
                Self::request_headers(request)?,
                sse_data,
            )
            .await?;

        // Usage-only chunks arrive with no choices; they carry no text.
        let chat_stream = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) => {
                    let choice = chunk.choices.into_iter().next()?;
                    let role = choice.delta.role.unwrap_or(Role::Assistant);
                    let content = choice.delta.content.unwrap_or_default();
                    Some(Ok(ChatChunk::new(role, content)))
                }
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(chat_stream))
    }
}
