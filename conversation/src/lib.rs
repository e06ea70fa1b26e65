//! History-managed chat sessions on top of the `llm` transport.
//!
//! A [`ChatClient`] owns one conversation. Each turn appends the user's
//! message, asks the model for a reply (retrying transport failures up to the
//! configured bound), appends the reply and trims the oldest messages until
//! the history fits its word budget again.

mod client;
mod client_config;
mod error;
mod history;

pub use client::{ChatClient, Reply, SendOptions};
pub use client_config::{APP_REFERER, APP_TITLE, ApiKey, ClientConfig, DEFAULT_MAX_TOKENS};
pub use error::{ChatError, ConfigError, MalformedResponseError};
pub use history::History;
pub use tokio_util::sync::CancellationToken;
