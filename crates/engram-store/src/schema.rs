//! Schema definitions for the Engram `memories` table
//!
//! One table, append-only:
//! - memories: text + embedding + provenance metadata, one row per
//!   memory, never updated in place.

use chrono::{DateTime, Utc};

/// Module for serializing chrono DateTime to SurrealDB datetime format
pub(crate) mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Metadata attached to a memory: string keys to scalar/string values
/// (`source`, `role`, `timestamp`, ...). Keys need not be unique across
/// records.
pub type MemoryMetadata = serde_json::Map<String, serde_json::Value>;

/// A persisted memory. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMemory {
    /// SurrealDB record ID
    pub id: Option<surrealdb::sql::Thing>,
    /// The memory content (human-readable, non-empty)
    pub text: String,
    /// Fixed-dimension embedding vector
    pub embedding: Vec<f32>,
    /// Provenance metadata
    pub metadata: MemoryMetadata,
    /// Content fingerprint for duplicate detection
    pub fingerprint: Fingerprint,
    /// Model that produced the embedding
    pub embedding_model: String,
    /// Length of `embedding`, recorded for configuration checks
    pub embedding_dimension: usize,
    /// Timestamp assigned at insert time
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl StoredMemory {
    /// Build a complete record ready for a single durable write.
    pub fn new(
        text: &str,
        embedding: Vec<f32>,
        metadata: MemoryMetadata,
        embedding_model: &str,
    ) -> Self {
        let fingerprint = Fingerprint::of_memory(text, &metadata);
        let embedding_dimension = embedding.len();
        StoredMemory {
            id: None,
            text: text.to_string(),
            embedding,
            metadata,
            fingerprint,
            embedding_model: embedding_model.to_string(),
            embedding_dimension,
            created_at: Utc::now(),
        }
    }

    /// The `source` metadata value, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Similarity metric for the vector index. Writer and reader must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMetric {
    Cosine,
}

impl SimilarityMetric {
    /// SurrealQL `DIST` keyword.
    pub fn as_surreal(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "COSINE",
        }
    }
}

/// Descriptor for the vector search index over `memories.embedding`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name
    pub name: String,
    /// Indexed field
    pub field: String,
    /// Vector dimension `D`; every stored embedding must have this length
    pub dimension: usize,
    /// Similarity metric
    pub metric: SimilarityMetric,
}

impl IndexSpec {
    /// Default cosine index over `embedding` for the given dimension.
    pub fn cosine(dimension: usize) -> Self {
        IndexSpec {
            name: "vector_index_cosine".to_string(),
            field: "embedding".to_string(),
            dimension,
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// One search match: a record reference plus its similarity score.
/// Vector hits score in the metric's native range (cosine: [-1, 1]);
/// fallback hits score by term overlap in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub memory: StoredMemory,
    pub score: f32,
}

/// Result of a search, including the degraded-path diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matches, score descending, ties broken by `created_at` descending
    pub hits: Vec<SearchHit>,
    /// Whether the keyword fallback served this query
    pub used_fallback: bool,
    /// Wall-clock time spent in the store
    pub elapsed_ms: u64,
}

impl SearchResponse {
    /// Empty result set (not an error).
    pub fn empty(used_fallback: bool, elapsed_ms: u64) -> Self {
        SearchResponse {
            hits: Vec::new(),
            used_fallback,
            elapsed_ms,
        }
    }
}

/// Collection-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total stored memories
    pub total: usize,
    /// Timestamp of the most recent insert
    pub latest_created_at: Option<DateTime<Utc>>,
    /// Memory counts grouped by `metadata.source`
    pub by_source: std::collections::BTreeMap<String, usize>,
}
