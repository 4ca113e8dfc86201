//! Storage trait for the memory collection
//!
//! `MemoryStore` is the seam between the engine and its backend. The
//! production implementation is [`crate::SurrealMemoryStore`]; an
//! in-memory fake for testing lives in [`crate::fakes`].

use async_trait::async_trait;
use std::collections::HashSet;

use crate::fingerprint::Fingerprint;
use crate::schema::{IndexSpec, MemoryMetadata, SearchResponse, StoreStats, StoredMemory};
use crate::Result;

/// Append-only memory collection with similarity search.
///
/// Guarantees:
/// - `insert` persists one complete record; concurrent readers never
///   observe a partially-written record.
/// - Records are never mutated or deleted by this interface.
/// - `search` degrades to keyword matching when the vector index is
///   unavailable instead of erroring; the response says which path ran.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Embed `text` in document mode and persist it with `metadata`.
    ///
    /// Fails with `InvalidInput` for empty text, `Embedding` when the
    /// provider exhausted its retries, or `StorageFailure` on write
    /// errors.
    async fn insert(&self, text: &str, metadata: MemoryMetadata) -> Result<StoredMemory>;

    /// Top-k similarity search (`top_k >= 1`). Over-fetches candidates
    /// from the approximate index, re-ranks, and truncates. An empty
    /// result set is `Ok`, not an error.
    async fn search(&self, query: &str, top_k: usize) -> Result<SearchResponse>;

    /// Create the vector index if absent; no-op when an equivalent
    /// index already exists. Safe to call concurrently and repeatedly.
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Fingerprints of every stored memory. Used to (re)build the sync
    /// cursor by scanning existing records.
    async fn known_fingerprints(&self) -> Result<HashSet<Fingerprint>>;

    /// Collection statistics (count, latest insert, source breakdown).
    async fn stats(&self) -> Result<StoreStats>;
}
