//! Errors from a single completion call
//!
//! Clients never retry on their own; [`LlmError::is_retryable`] tells the
//! tutor's retry policy which failures are worth another attempt.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429, with the provider's `retry-after` or a default wait
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Provider returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Could not reach the provider: {0}")]
    Network(#[from] reqwest::Error),

    /// The reply parsed but carried nothing usable
    #[error("Unusable reply: {0}")]
    InvalidResponse(String),

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Malformed JSON from the provider: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing API key or unknown provider; fixed by editing the config
    #[error("LLM client misconfigured: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether the same request might succeed if sent again
    ///
    /// Server-side trouble (5xx, 408), rate limits and transport failures
    /// are transient. Anything the request or config caused is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_) => true,
            Self::ApiError { status, .. } => *status >= 500 || *status == 408,
            Self::InvalidResponse(_) | Self::Json(_) | Self::Config(_) => false,
        }
    }
}
