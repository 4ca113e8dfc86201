//! Engram Embedding Layer
//!
//! Turns free text into fixed-length vectors via an external embedding
//! provider. This crate owns the outbound HTTP client, the shared
//! retry/backoff policy, and the in-memory fakes used across the
//! workspace for testing.
//!
//! ## Layer 1 - Embedding
//!
//! Focus: provider contract, retry discipline, typed API boundary.

pub mod backoff;
pub mod error;
pub mod fakes;
pub mod provider;
pub mod voyage;

pub use backoff::BackoffPolicy;
pub use error::EmbedError;
pub use fakes::{FakeEmbedder, FlakyEmbedder};
pub use provider::{EmbeddingMode, EmbeddingProvider};
pub use voyage::{VoyageClient, VoyageConfig};

/// Result type for embedding operations
pub type Result<T> = std::result::Result<T, EmbedError>;
