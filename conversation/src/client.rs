use colored::Colorize;
use futures::StreamExt;
use llm::{ChatMessage, ChatModel, ChatRequest, CompletionOptions, ModelProvider, Role, TransportError};
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client_config::ClientConfig;
use crate::error::{ChatError, ConfigError, MalformedResponseError};
use crate::history::History;

const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";
const JSON_INSTRUCTION: &str = " Please return your response in JSON format unless specified otherwise.";

/// Per-turn options for [`ChatClient::send`].
#[derive(Default)]
pub struct SendOptions<'a> {
    on_fragment: Option<&'a mut (dyn FnMut(&str) + Send)>,
    max_tokens: Option<u32>,
    local_echo: bool,
    cancellation: Option<CancellationToken>,
}

impl<'a> SendOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with each streamed fragment as it arrives, in arrival order.
    pub fn on_fragment(mut self, callback: &'a mut (dyn FnMut(&str) + Send)) -> Self {
        self.on_fragment = Some(callback);
        self
    }

    /// Overrides the configured response length cap for this turn.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Have the client print streamed fragments to stdout itself.
    pub fn local_echo(mut self, enabled: bool) -> Self {
        self.local_echo = enabled;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// The assistant's answer for one turn.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    /// Raw text as returned by the model
    pub content: String,
    /// Parsed value, in JSON mode when the text parsed
    pub structured: Option<serde_json::Value>,
    /// Set in JSON mode when the text did not parse
    pub warning: Option<MalformedResponseError>,
}

impl Reply {
    fn text(content: String) -> Self {
        Reply {
            content,
            structured: None,
            warning: None,
        }
    }
}

enum AttemptError {
    Transport(TransportError),
    Cancelled,
}

impl From<TransportError> for AttemptError {
    fn from(error: TransportError) -> Self {
        AttemptError::Transport(error)
    }
}

async fn until_cancelled<F: Future>(
    token: Option<&CancellationToken>,
    future: F,
) -> Result<F::Output, AttemptError> {
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(AttemptError::Cancelled),
            output = future => Ok(output),
        },
        None => Ok(future.await),
    }
}

/// A conversation with one model, kept within a word budget.
///
/// Turns must not overlap: `send` takes `&mut self`, so a second turn can only
/// start once the previous one has returned.
pub struct ChatClient {
    config: ClientConfig,
    model: Arc<dyn ChatModel + Send + Sync>,
    system_message: String,
    history: History,
}

impl ChatClient {
    /// Resolve the key and talk to the configured gateway (OpenRouter unless
    /// `base_url` says otherwise).
    pub fn connect(config: ClientConfig) -> Result<Self, ConfigError> {
        let provider = config.provider()?;
        Self::new(config, &provider)
    }

    pub fn new(config: ClientConfig, provider: &impl ModelProvider) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = provider
            .create_chat_model(&config.model)
            .ok_or_else(|| ConfigError::UnknownModel(config.model.clone()))?;
        Self::with_model(config, model)
    }

    /// Build a client around an existing transport handle.
    pub fn with_model(
        config: ClientConfig,
        model: Arc<dyn ChatModel + Send + Sync>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            name = %config.name,
            model = %config.model,
            json_mode = config.json_mode,
            stream = config.stream,
            max_history_words = config.max_history_words,
            max_words_per_message = ?config.max_words_per_message,
            max_retries = config.max_retries,
            "chat client initialized"
        );

        let mut client = ChatClient {
            config,
            model,
            system_message: String::new(),
            history: History::new(),
        };
        client.set_system_message(None);
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.history.messages()
    }

    /// Words currently held in non-system history
    pub fn history_word_count(&self) -> usize {
        self.history.word_count()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Drop a trailing user message that never got an answer, e.g. after a
    /// failed or cancelled turn.
    pub fn pop_unanswered(&mut self) -> Option<ChatMessage> {
        self.history.pop_unanswered()
    }

    /// Talk to a different model from the next turn on. History is kept.
    pub fn switch_model(&mut self, model: Arc<dyn ChatModel + Send + Sync>) {
        self.config.model = model.name().to_string();
        self.model = model;
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.config.stream = stream;
    }

    /// Replace the system message; `None` (or blank) restores the default.
    pub fn set_system_message(&mut self, message: Option<&str>) {
        let base = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_MESSAGE);

        let mut system_message = base.to_string();
        if self.config.json_mode && !base.to_lowercase().contains("json") {
            system_message.push_str(JSON_INSTRUCTION);
        }
        self.system_message = system_message;
    }

    pub fn append_message(&mut self, role: Role, content: impl Into<String>) {
        let mut content = content.into();
        if role == Role::User {
            if let Some(limit) = self.config.max_words_per_message.filter(|&n| n > 0) {
                content.push_str(&format!(" please use {} words or less", limit));
            }
        }
        self.history.push(ChatMessage::new(role, content));
    }

    pub fn trim_history(&mut self) {
        let removed = self.history.trim_to(self.config.max_history_words);
        if removed > 0 {
            debug!(
                removed,
                remaining_words = self.history.word_count(),
                "trimmed history"
            );
        }
    }

    /// Run one turn: append `text`, get the reply (retrying transport
    /// failures), append it and trim history.
    pub async fn send(&mut self, text: &str, mut options: SendOptions<'_>) -> Result<Reply, ChatError> {
        self.append_message(Role::User, text);

        let content = self.request_reply(&mut options).await?;
        let reply = self.interpret(content);

        self.append_message(Role::Assistant, reply.content.clone());
        self.trim_history();
        Ok(reply)
    }

    /// Blocking form of [`ChatClient::send`]. Runs the same turn on a private
    /// current-thread runtime, so it must not be called from async code.
    pub fn send_blocking(&mut self, text: &str, options: SendOptions<'_>) -> Result<Reply, ChatError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.send(text, options))
    }

    fn build_request(&self, max_tokens: u32) -> ChatRequest {
        let system = ChatMessage::system(self.system_message.clone());
        ChatRequest::new(std::iter::once(&system).chain(self.history.messages())).with_options(
            CompletionOptions {
                max_tokens: Some(max_tokens),
                temperature: self.config.temperature,
                extra_headers: self.config.extra_headers.clone(),
            },
        )
    }

    async fn request_reply(&self, options: &mut SendOptions<'_>) -> Result<String, ChatError> {
        let request = self.build_request(options.max_tokens.unwrap_or(self.config.max_tokens));
        let max_retries = self.config.max_retries;
        let mut failures = 0;

        loop {
            if options.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(ChatError::Cancelled);
            }

            debug!(
                attempt = failures + 1,
                model = self.model.name(),
                stream = self.config.stream,
                "requesting completion"
            );

            match self.attempt(&request, options).await {
                Ok(content) => return Ok(content),
                Err(AttemptError::Cancelled) => return Err(ChatError::Cancelled),
                Err(AttemptError::Transport(error)) => {
                    failures += 1;
                    warn!(attempt = failures, max_retries, %error, "completion attempt failed");
                    if failures >= max_retries {
                        return Err(ChatError::RetryExhausted {
                            attempts: failures,
                            source: error,
                        });
                    }
                    until_cancelled(
                        options.cancellation.as_ref(),
                        tokio::time::sleep(self.config.retry_delay),
                    )
                    .await
                    .map_err(|_| ChatError::Cancelled)?;
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &ChatRequest,
        options: &mut SendOptions<'_>,
    ) -> Result<String, AttemptError> {
        let token = options.cancellation.clone();

        if !self.config.stream {
            let message = until_cancelled(token.as_ref(), self.model.chat(request)).await??;
            return Ok(message.content);
        }

        let mut stream = until_cancelled(token.as_ref(), self.model.stream_chat(request)).await??;
        let mut content = String::new();

        while let Some(chunk) = until_cancelled(token.as_ref(), stream.next()).await? {
            let chunk = chunk?;
            if chunk.content.is_empty() {
                continue;
            }
            if options.local_echo {
                print!("{}", chunk.content.as_str().color(self.config.echo_color));
                let _ = io::stdout().flush();
            }
            if let Some(callback) = options.on_fragment.as_deref_mut() {
                callback(&chunk.content);
            }
            content.push_str(&chunk.content);
        }

        if options.local_echo {
            println!();
        }
        Ok(content)
    }

    fn interpret(&self, content: String) -> Reply {
        if !self.config.json_mode {
            return Reply::text(content);
        }

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Reply {
                content,
                structured: Some(value),
                warning: None,
            },
            Err(error) => {
                warn!(%error, "response is not valid JSON, returning it as text");
                Reply {
                    content,
                    structured: None,
                    warning: Some(error.into()),
                }
            }
        }
    }
}
