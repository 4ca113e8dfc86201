//! SurrealDB schema migrations and initialization
//!
//! Sets up the `memories` table with append-only permissions and the
//! scalar indexes. The vector index is NOT created here — its dimension
//! depends on the configured embedding provider, so it is created by
//! [`crate::store_traits::MemoryStore::ensure_index`] at runtime.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Engram tables in SurrealDB
///
/// This should be called once on first connection to set up the schema.
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Engram SurrealDB schema");

    init_memories_table(db).await?;

    info!("Engram schema initialization complete");
    Ok(())
}

/// Initialize `memories` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE memories {
///   text:                 STRING (non-empty)
///   embedding:            ARRAY<FLOAT> (fixed dimension per store)
///   metadata:             OBJECT (source, role, timestamp, ...)
///   fingerprint:          STRING (sha-256 hex, indexed)
///   embedding_model:      STRING
///   embedding_dimension:  INT
///   created_at:           DATETIME (indexed)
/// }
/// ```
///
/// Constraints:
/// - Records are append-only: update and delete are denied at the table
///   level, matching the engine's immutable-record model.
/// - `fingerprint` is indexed (non-unique): the sync cursor dedupes,
///   and a crash between insert and cursor update may legitimately
///   re-insert one item (at-least-once semantics).
async fn init_memories_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing memories table");

    let sql = r#"
        DEFINE TABLE memories
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        -- Index fingerprint for cursor scans and duplicate diagnostics
        DEFINE INDEX idx_fingerprint ON TABLE memories COLUMNS fingerprint;

        -- Index created_at for recency windows and tie-breaking
        DEFINE INDEX idx_created_at ON TABLE memories COLUMNS created_at;

        -- Index metadata.source for the stats breakdown
        DEFINE INDEX idx_source ON TABLE memories COLUMNS metadata.source;
    "#;

    db.query(sql).await?;
    info!("✓ memories table initialized");
    Ok(())
}
