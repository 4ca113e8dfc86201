//! Error types for the core orchestration layer

use engram_store::StoreError;
use thiserror::Error;

/// Errors talking to the agent collaborator
#[derive(Error, Debug)]
pub enum AgentError {
    /// Transport-level failure (connect, DNS, TLS)
    #[error("Agent request failed: {0}")]
    Http(String),

    /// The request exceeded its deadline
    #[error("Agent request timed out")]
    Timeout,

    /// Agent API returned an error status
    #[error("Agent API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response did not match the documented shape
    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),
}

impl AgentError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Http(_) | AgentError::Timeout => true,
            AgentError::Api { status, .. } => *status == 429 || *status >= 500,
            AgentError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Timeout
        } else {
            AgentError::Http(err.to_string())
        }
    }
}

/// Errors talking to the web-search collaborator
#[derive(Error, Debug)]
pub enum WebSearchError {
    #[error("Web search request failed: {0}")]
    Http(String),

    #[error("Web search request timed out")]
    Timeout,

    #[error("Web search API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed web search response: {0}")]
    MalformedResponse(String),
}

impl WebSearchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            WebSearchError::Http(_) | WebSearchError::Timeout => true,
            WebSearchError::Api { status, .. } => *status == 429 || *status >= 500,
            WebSearchError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for WebSearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WebSearchError::Timeout
        } else {
            WebSearchError::Http(err.to_string())
        }
    }
}

/// Errors from configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config {path}: {message}")]
    ParseFailed { path: String, message: String },

    #[error("Missing config field: {0}")]
    MissingField(String),

    #[error("Failed to write config {path}: {message}")]
    WriteFailed { path: String, message: String },
}

/// Errors that abort a sync run as a whole.
///
/// Per-item failures are NOT represented here — they are collected in
/// the [`crate::sync::SyncReport`] and the run continues.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The initial fetch from the agent collaborator failed; there is
    /// nothing to synchronize.
    #[error("Agent unreachable during {step}: {source}")]
    AgentUnreachable {
        step: &'static str,
        #[source]
        source: AgentError,
    },

    /// The store itself is unreachable (cursor scan failed)
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by an interactive chat turn
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
