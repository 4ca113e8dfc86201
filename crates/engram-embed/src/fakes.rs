//! In-memory fakes for the embedding provider (testing only)
//!
//! `FakeEmbedder` produces deterministic bag-of-words vectors: texts
//! sharing tokens get positive cosine similarity, identical texts score
//! 1.0. `FlakyEmbedder` fails on demand for partial-failure tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::EmbedError;
use crate::provider::{EmbeddingMode, EmbeddingProvider};
use crate::Result;

// ---------------------------------------------------------------------------
// FakeEmbedder
// ---------------------------------------------------------------------------

/// Deterministic offline embedder.
///
/// Each lowercased whitespace token is hashed into one of `dimension`
/// buckets; the resulting count vector is L2-normalized. No network, no
/// model download, stable across runs.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dimension: usize,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize;
            vector[bucket % self.dimension] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str, _mode: EmbeddingMode) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput);
        }
        Ok(self.embed_text(text))
    }

    async fn embed_many(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, mode).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "fake-bow"
    }
}

// ---------------------------------------------------------------------------
// FlakyEmbedder
// ---------------------------------------------------------------------------

/// Wraps [`FakeEmbedder`] and fails permanently on texts containing
/// `fail_marker`, simulating a provider that exhausted its retries.
pub struct FlakyEmbedder {
    inner: FakeEmbedder,
    fail_marker: String,
    failures: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(dimension: usize, fail_marker: impl Into<String>) -> Self {
        Self {
            inner: FakeEmbedder::new(dimension),
            fail_marker: fail_marker.into(),
            failures: AtomicUsize::new(0),
        }
    }

    /// How many embed calls have failed so far.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>> {
        if text.contains(&self.fail_marker) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(EmbedError::Unavailable {
                attempts: 3,
                last: "simulated provider outage".to_string(),
            });
        }
        self.inner.embed(text, mode).await
    }

    async fn embed_many(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, mode).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model(&self) -> &str {
        "fake-bow-flaky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn identical_texts_score_one() {
        let embedder = FakeEmbedder::new(64);
        let a = embedder.embed("quantum finance", EmbeddingMode::Document).await.unwrap();
        let b = embedder.embed("quantum finance", EmbeddingMode::Query).await.unwrap();
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_tokens_score_positive() {
        let embedder = FakeEmbedder::new(64);
        let doc = embedder
            .embed("Discussed quantum computing in finance", EmbeddingMode::Document)
            .await
            .unwrap();
        let query = embedder.embed("quantum finance", EmbeddingMode::Query).await.unwrap();
        assert!(cosine(&doc, &query) > 0.0);
    }

    #[tokio::test]
    async fn vectors_have_configured_dimension() {
        let embedder = FakeEmbedder::new(128);
        let v = embedder.embed("hello world", EmbeddingMode::Document).await.unwrap();
        assert_eq!(v.len(), 128);
    }

    #[tokio::test]
    async fn empty_text_rejected() {
        let embedder = FakeEmbedder::default();
        assert!(matches!(
            embedder.embed("  \t ", EmbeddingMode::Document).await,
            Err(EmbedError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn flaky_fails_only_on_marker() {
        let embedder = FlakyEmbedder::new(64, "poison");
        assert!(embedder.embed("safe text", EmbeddingMode::Document).await.is_ok());
        let err = embedder.embed("poison pill", EmbeddingMode::Document).await.unwrap_err();
        assert!(matches!(err, EmbedError::Unavailable { .. }));
        assert_eq!(embedder.failure_count(), 1);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let embedder = FakeEmbedder::new(64);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = embedder.embed_many(&texts, EmbeddingMode::Document).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
    }
}
