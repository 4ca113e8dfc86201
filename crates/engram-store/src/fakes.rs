//! In-memory fake for the memory store (testing only)
//!
//! `InMemoryMemoryStore` satisfies the [`MemoryStore`] contract without
//! a database: exact cosine search when the index has been provisioned,
//! keyword fallback when it has not — the same degradation shape as the
//! SurrealDB implementation.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use engram_embed::{EmbeddingMode, EmbeddingProvider};

use crate::error::StoreError;
use crate::fingerprint::Fingerprint;
use crate::ranking;
use crate::schema::{
    IndexSpec, MemoryMetadata, SearchHit, SearchResponse, StoreStats, StoredMemory,
};
use crate::store_traits::MemoryStore;
use crate::Result;

/// In-memory store backed by a `Mutex<Vec<StoredMemory>>`.
///
/// Starts without a vector index — searches use the keyword fallback
/// until [`MemoryStore::ensure_index`] is called, which is exactly the
/// unprovisioned-infrastructure condition the engine must tolerate.
pub struct InMemoryMemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    records: Mutex<Vec<StoredMemory>>,
    index: Mutex<Option<IndexSpec>>,
}

impl InMemoryMemoryStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            records: Mutex::new(Vec::new()),
            index: Mutex::new(None),
        }
    }

    /// Convenience: a store with the cosine index already provisioned.
    pub fn with_index(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let store = Self::new(embedder);
        let spec = IndexSpec::cosine(store.embedder.dimension());
        *store.index.lock().unwrap() = Some(spec);
        store
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn insert(&self, text: &str, metadata: MemoryMetadata) -> Result<StoredMemory> {
        if text.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "memory text is empty".to_string(),
            ));
        }

        let embedding = self.embedder.embed(text, EmbeddingMode::Document).await?;
        let expected = self.embedder.dimension();
        if embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }

        let record = StoredMemory::new(text, embedding, metadata, self.embedder.model());
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "search query is empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(StoreError::InvalidInput("top_k must be >= 1".to_string()));
        }

        let started = Instant::now();
        let indexed = self.index.lock().unwrap().is_some();

        let mut hits: Vec<SearchHit> = if indexed {
            let query_vec = self.embedder.embed(query, EmbeddingMode::Query).await?;
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|memory| SearchHit {
                    score: ranking::cosine_similarity(&query_vec, &memory.embedding),
                    memory: memory.clone(),
                })
                .collect()
        } else {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter_map(|memory| {
                    let score = ranking::term_overlap(query, &memory.text);
                    (score > 0.0).then(|| SearchHit {
                        memory: memory.clone(),
                        score,
                    })
                })
                .collect()
        };

        ranking::order_hits(&mut hits);
        hits.truncate(top_k);

        Ok(SearchResponse {
            hits,
            used_fallback: !indexed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn ensure_index(&self, spec: &IndexSpec) -> Result<()> {
        if spec.dimension != self.embedder.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: self.embedder.dimension(),
                actual: spec.dimension,
            });
        }

        let mut index = self.index.lock().unwrap();
        match index.as_ref() {
            Some(existing) if existing == spec => Ok(()),
            _ => {
                *index = Some(spec.clone());
                Ok(())
            }
        }
    }

    async fn known_fingerprints(&self) -> Result<HashSet<Fingerprint>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.fingerprint.clone())
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let records = self.records.lock().unwrap();
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        for record in records.iter() {
            let source = record.source().unwrap_or("unknown").to_string();
            *by_source.entry(source).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total: records.len(),
            latest_created_at: records.iter().map(|r| r.created_at).max(),
            by_source,
        })
    }
}
