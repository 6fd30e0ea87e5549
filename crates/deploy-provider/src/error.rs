//! Errors raised at the model boundary.

use std::time::Duration;
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP request could not be sent or its body not read.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// A response that does not follow the chat-completions format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    /// The key was rejected (HTTP 401) or is not a valid header value.
    #[error("Invalid API key for provider: {0}")]
    InvalidApiKey(String),

    /// HTTP 429. `retry_after` comes from the `Retry-After` header.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The event stream closed before a finish reason arrived.
    #[error("Stream interrupted")]
    StreamInterrupted,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider error: {message}")]
    Internal { message: String },

    /// Any other non-success HTTP status.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

impl ProviderError {
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey(provider.into())
    }

    pub fn invalid_api_key(provider: impl Into<String>) -> Self {
        Self::InvalidApiKey(provider.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }
}
