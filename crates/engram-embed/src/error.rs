//! Error types for the embedding layer

use thiserror::Error;

/// Errors that can occur while producing embeddings
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Input text was empty or whitespace-only
    #[error("Invalid input: text is empty after trimming")]
    InvalidInput,

    /// Provider rejected the request due to rate limiting (HTTP 429)
    #[error("Provider rate limited the request: {0}")]
    RateLimited(String),

    /// Provider returned an error status
    #[error("Provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level failure (connect, DNS, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its deadline
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Response did not match the documented shape
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Retries exhausted; carries the final underlying failure
    #[error("Embedding unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },
}

impl EmbedError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Rate limits, 5xx statuses, timeouts and transport errors are
    /// transient; 4xx statuses and malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbedError::RateLimited(_) | EmbedError::Network(_) | EmbedError::Timeout(_) => true,
            EmbedError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbedError::Timeout(0)
        } else if err.is_connect() {
            EmbedError::Network(format!("Connection failed: {}", err))
        } else {
            EmbedError::Network(err.to_string())
        }
    }
}
