//! Embedding provider contract
//!
//! The provider turns text into fixed-length vectors. Document and query
//! embeddings may be weighted differently by the provider, but the
//! dimensionality is identical for both modes — vector search depends
//! on that symmetry.

use async_trait::async_trait;

use crate::Result;

/// How the provider should weight the embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    /// Stored content
    Document,
    /// Search queries
    Query,
}

impl EmbeddingMode {
    /// Wire value expected by Voyage-style APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingMode::Document => "document",
            EmbeddingMode::Query => "query",
        }
    }
}

/// Text → vector, with a stable dimension per provider instance.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Fails with `EmbedError::InvalidInput` when
    /// `text` is empty after trimming.
    async fn embed(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>>;

    /// Embed a batch, preserving input order. Implementations may embed
    /// identical texts once per batch and reuse the vector.
    async fn embed_many(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>>;

    /// Output vector length, constant for the lifetime of the provider.
    fn dimension(&self) -> usize;

    /// Model identifier, recorded on every stored memory.
    fn model(&self) -> &str;
}
