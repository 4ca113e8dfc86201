//! SurrealDB-backed MemoryStore implementation
//!
//! Provides insert, vector similarity search with a keyword fallback,
//! and idempotent vector-index creation over the `memories` table.
//!
//! Supports both local (in-memory / surrealkv) and cloud (WebSocket)
//! connections, mirroring the rest of the Stevedores stack.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument, warn};

use engram_embed::{EmbeddingMode, EmbeddingProvider};

use crate::error::StoreError;
use crate::fingerprint::Fingerprint;
use crate::ranking;
use crate::schema::{
    IndexSpec, MemoryMetadata, SearchHit, SearchResponse, StoreStats, StoredMemory,
};
use crate::store_traits::MemoryStore;
use crate::{migrations, Result};

/// Candidates requested from the approximate index per `top_k` result.
/// Compensates for ANN backends that return a suboptimal top-1 but an
/// acceptable top-N.
const OVERFETCH_FACTOR: usize = 10;

/// How many recent records the keyword fallback considers.
const FALLBACK_WINDOW: usize = 512;

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "engram")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "engram")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace =
            std::env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "engram".to_string());
        let database = std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "main".to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB-backed implementation of [`MemoryStore`].
#[derive(Clone)]
pub struct SurrealMemoryStore {
    db: Surreal<Any>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: IndexSpec,
}

#[derive(Debug, Deserialize)]
struct ScoredRow {
    score: f32,
    #[serde(flatten)]
    memory: StoredMemory,
}

#[derive(Debug, Deserialize)]
struct FingerprintRow {
    fingerprint: Fingerprint,
}

#[derive(Debug, Deserialize)]
struct DimensionRow {
    embedding_dimension: usize,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct LatestRow {
    #[serde(with = "crate::schema::surreal_datetime")]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SourceCountRow {
    source: Option<String>,
    count: usize,
}

impl SurrealMemoryStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `engram/main`, and runs `init_schema`.
    pub async fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        db.use_ns("engram")
            .use_db("main")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        info!("SurrealMemoryStore connected (in-memory)");
        Ok(Self::with_db(db, embedder))
    }

    /// Create from environment variables.
    ///
    /// Tries, in order: SurrealDB Cloud config, `SURREALDB_URL`, then a
    /// local surrealkv database under `.engram/db`.
    pub async fn from_env(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            let db = surrealdb::engine::any::connect(&config.endpoint)
                .await
                .map_err(|e| {
                    StoreError::Connection(format!(
                        "Failed to connect to {}: {}",
                        config.endpoint, e
                    ))
                })?;

            if config.is_root {
                db.signin(Root {
                    username: &config.username,
                    password: &config.password,
                })
                .await
                .map_err(|e| StoreError::Connection(format!("Root auth failed: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &config.username,
                    password: &config.password,
                })
                .await
                .map_err(|e| StoreError::Connection(format!("DB auth failed: {e}")))?;
            }

            db.use_ns(&config.namespace)
                .use_db(&config.database)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;

            migrations::init_schema(&db).await?;
            info!("SurrealMemoryStore connected (cloud)");
            return Ok(Self::with_db(db, embedder));
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let db = surrealdb::engine::any::connect(&url)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;

            db.use_ns("engram")
                .use_db("main")
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;

            migrations::init_schema(&db).await?;
            info!("SurrealMemoryStore connected ({})", url);
            return Ok(Self::with_db(db, embedder));
        }

        // Default to local persistence in .engram/db
        let path = ".engram/db";
        std::fs::create_dir_all(path).map_err(|e| {
            StoreError::Connection(format!(
                "Failed to create database directory {}: {}",
                path, e
            ))
        })?;
        let url = format!("surrealkv://{}", path);
        info!(
            "No cloud config or SURREALDB_URL found, using local persistence: {}",
            url
        );

        let db = surrealdb::engine::any::connect(&url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns("engram")
            .use_db("main")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        Ok(Self::with_db(db, embedder))
    }

    fn with_db(db: Surreal<Any>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let index = IndexSpec::cosine(embedder.dimension());
        Self {
            db,
            embedder,
            index,
        }
    }

    /// The index descriptor this store reads and writes with.
    pub fn index_spec(&self) -> &IndexSpec {
        &self.index
    }

    // -- private helpers -----------------------------------------------------

    /// KNN query against the vector index. Any backend failure here is
    /// classified as `IndexUnavailable` so `search` can degrade.
    async fn vector_search(&self, query_vec: &[f32], candidates: usize) -> Result<Vec<SearchHit>> {
        let sql = format!(
            "SELECT *, vector::similarity::cosine({field}, $q) AS score \
             FROM memories WHERE {field} <|{candidates}|> $q",
            field = self.index.field,
        );

        let mut res = self
            .db
            .query(sql)
            .bind(("q", query_vec.to_vec()))
            .await
            .map_err(|e| StoreError::IndexUnavailable(e.to_string()))?;

        let rows: Vec<ScoredRow> = res
            .take(0)
            .map_err(|e| StoreError::IndexUnavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                memory: row.memory,
                score: row.score,
            })
            .collect())
    }

    /// Keyword fallback: rank the most recent records by term overlap
    /// over text and string metadata. Never touches the vector index.
    ///
    /// # TDD: missing_index_degrades_to_keyword_search
    async fn fallback_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let sql = format!(
            "SELECT * FROM memories ORDER BY created_at DESC LIMIT {}",
            FALLBACK_WINDOW
        );

        let mut res = self
            .db
            .query(sql)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let rows: Vec<StoredMemory> = res
            .take(0)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .filter_map(|memory| {
                let mut haystack = memory.text.clone();
                for value in memory.metadata.values() {
                    if let Some(s) = value.as_str() {
                        haystack.push(' ');
                        haystack.push_str(s);
                    }
                }
                let score = ranking::term_overlap(query, &haystack);
                (score > 0.0).then_some(SearchHit { memory, score })
            })
            .collect();

        ranking::order_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[async_trait]
impl MemoryStore for SurrealMemoryStore {
    #[instrument(skip(self, text, metadata), fields(text_len = text.len()))]
    async fn insert(&self, text: &str, metadata: MemoryMetadata) -> Result<StoredMemory> {
        if text.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "memory text is empty".to_string(),
            ));
        }

        let embedding = self.embedder.embed(text, EmbeddingMode::Document).await?;
        if embedding.len() != self.index.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.index.dimension,
                actual: embedding.len(),
            });
        }

        let record = StoredMemory::new(text, embedding, metadata, self.embedder.model());

        // One complete write; the record is visible only after this
        // call returns.
        let created: Option<StoredMemory> = self
            .db
            .create("memories")
            .content(record)
            .await
            .map_err(|e| StoreError::StorageFailure(e.to_string()))?;

        let created = created.ok_or_else(|| {
            StoreError::StorageFailure("insert returned no record".to_string())
        })?;

        debug!(fingerprint = created.fingerprint.short(), "Memory inserted");
        Ok(created)
    }

    #[instrument(skip(self, query))]
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
        let query_vec = self.embedder.embed(query, EmbeddingMode::Query).await?;
        if query_vec.len() != self.index.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.index.dimension,
                actual: query_vec.len(),
            });
        }

        let candidates = top_k.saturating_mul(OVERFETCH_FACTOR);
        match self.vector_search(&query_vec, candidates).await {
            Ok(mut hits) => {
                ranking::order_hits(&mut hits);
                hits.truncate(top_k);
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(hits = hits.len(), elapsed_ms, "Vector search complete");
                Ok(SearchResponse {
                    hits,
                    used_fallback: false,
                    elapsed_ms,
                })
            }
            Err(StoreError::IndexUnavailable(reason)) => {
                warn!(reason = %reason, "Vector search unavailable, using keyword fallback");
                let hits = self.fallback_search(query, top_k).await?;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                Ok(SearchResponse {
                    hits,
                    used_fallback: true,
                    elapsed_ms,
                })
            }
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self, spec), fields(index = %spec.name, dimension = spec.dimension))]
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<()> {
        if spec.dimension != self.embedder.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: self.embedder.dimension(),
                actual: spec.dimension,
            });
        }

        // Stored vectors must agree with the index dimension; a mismatch
        // is a configuration error, not something to paper over.
        let mut res = self
            .db
            .query("SELECT embedding_dimension FROM memories LIMIT 1")
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let rows: Vec<DimensionRow> = res
            .take(0)
            .map_err(|e| StoreError::Query(e.to_string()))?;
        if let Some(row) = rows.first() {
            if row.embedding_dimension != spec.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: spec.dimension,
                    actual: row.embedding_dimension,
                });
            }
        }

        let sql = format!(
            "DEFINE INDEX IF NOT EXISTS {name} ON TABLE memories \
             FIELDS {field} MTREE DIMENSION {dimension} DIST {metric} TYPE F32",
            name = spec.name,
            field = spec.field,
            dimension = spec.dimension,
            metric = spec.metric.as_surreal(),
        );

        self.db
            .query(sql)
            .await
            .map_err(|e| StoreError::StorageFailure(e.to_string()))?;

        info!(index = %spec.name, "✓ vector index ensured");
        Ok(())
    }

    async fn known_fingerprints(&self) -> Result<HashSet<Fingerprint>> {
        let mut res = self
            .db
            .query("SELECT fingerprint FROM memories")
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let rows: Vec<FingerprintRow> = res
            .take(0)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.fingerprint).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let mut res = self
            .db
            .query("SELECT count() AS count FROM memories GROUP ALL")
            .query("SELECT created_at FROM memories ORDER BY created_at DESC LIMIT 1")
            .query(
                "SELECT metadata.source AS source, count() AS count \
                 FROM memories GROUP BY source",
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let counts: Vec<CountRow> = res
            .take(0)
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let latest: Vec<LatestRow> = res
            .take(1)
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let sources: Vec<SourceCountRow> = res
            .take(2)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let by_source: BTreeMap<String, usize> = sources
            .into_iter()
            .map(|row| (row.source.unwrap_or_else(|| "unknown".to_string()), row.count))
            .collect();

        Ok(StoreStats {
            total: counts.first().map(|c| c.count).unwrap_or(0),
            latest_created_at: latest.into_iter().next().map(|r| r.created_at),
            by_source,
        })
    }
}
