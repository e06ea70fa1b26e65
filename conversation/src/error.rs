use llm::TransportError;
use thiserror::Error;

/// Problems with a [`ClientConfig`](crate::ClientConfig). These are fatal and
/// never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key is not set: pass one explicitly or set {env_var}")]
    MissingApiKey { env_var: String },

    #[error("max_retries must be at least 1")]
    InvalidRetryBound,

    #[error("model id must not be empty")]
    EmptyModel,

    #[error("provider has no chat model named {0}")]
    UnknownModel(String),

    #[error("failed to set up transport: {0}")]
    Transport(#[from] TransportError),
}

/// Why a chat turn produced no assistant reply.
///
/// In every case the user's message stays in history without an answer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("giving up after {attempts} failed attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// A JSON-mode reply that did not parse. Carried on the reply as a warning;
/// the turn still succeeds with the raw text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("response is not valid JSON: {reason}")]
pub struct MalformedResponseError {
    pub reason: String,
}

impl From<serde_json::Error> for MalformedResponseError {
    fn from(error: serde_json::Error) -> Self {
        MalformedResponseError {
            reason: error.to_string(),
        }
    }
}
