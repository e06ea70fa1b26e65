use thiserror::Error;

/// Failure of a single request attempt against a completion endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response contained no choices")]
    EmptyResponse,

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}
