use api_types::envelope::{self, Envelope};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::messages;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures surfaced to the dashboard. Messages come from the backend
/// envelope, passed through [`messages::translate`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    /// The edge proxy could not reach the backend.
    #[error("{0}")]
    Proxy(String),
    #[error("{status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Builds the error for a non-success response from its status and body.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<Envelope<Value>>(body)
            .ok()
            .and_then(|envelope| envelope.error);
        let code = parsed.as_ref().map(|err| err.code.as_str());
        let raw = parsed
            .as_ref()
            .map(|err| err.message.clone())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "unknown error".to_string());
        let message = messages::translate(&raw);

        if code == Some(envelope::PROXY_ERROR) {
            return Self::Proxy(message);
        }
        match status.as_u16() {
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            400 | 422 => Self::Validation(message),
            _ => Self::Server { status, message },
        }
    }

    /// Reads retry on these; client-side (4xx) errors never succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Proxy(_) => true,
            Self::Server { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
