//! Error types for the memory store

use engram_embed::EmbedError;
use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller passed bad arguments (empty text, top_k = 0)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database read/query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Durable write failed
    #[error("Durable write failed: {0}")]
    StorageFailure(String),

    /// Vector search could not run (index missing or backend error).
    /// `search` never surfaces this to callers — it triggers the
    /// keyword fallback instead.
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Stored vectors and the configured index disagree on dimension.
    /// This is a configuration error, not a runtime-recoverable one.
    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Fingerprint string failed validation
    #[error("Invalid fingerprint: {fingerprint}")]
    InvalidFingerprint { fingerprint: String },

    /// Embedding provider failure, propagated from the embed layer
    #[error(transparent)]
    Embedding(#[from] EmbedError),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Query(format!("Serialization failed: {}", err))
    }
}
