//! Engram Memory Store
//!
//! Durable, append-only collection of agent memories with vector
//! similarity search and a keyword fallback when the vector index is
//! not provisioned.
//!
//! ## Layer 0 - Persistence
//!
//! - `schema`: `StoredMemory` and the `memories` table shape
//! - `migrations`: idempotent table/index initialization
//! - `surreal_store`: SurrealDB-backed [`MemoryStore`] implementation
//! - `fakes`: in-memory implementation for testing
//!
//! Records are immutable once inserted; updates are modeled as new
//! inserts, so the store never performs in-place mutation and readers
//! never observe partially-written records.

pub mod error;
pub mod fakes;
pub mod fingerprint;
pub mod migrations;
pub mod ranking;
pub mod schema;
pub mod store_traits;
pub mod surreal_store;

pub use error::StoreError;
pub use fakes::InMemoryMemoryStore;
pub use fingerprint::Fingerprint;
pub use schema::{
    IndexSpec, MemoryMetadata, SearchHit, SearchResponse, SimilarityMetric, StoreStats,
    StoredMemory,
};
pub use store_traits::MemoryStore;
pub use surreal_store::{CloudConfig, SurrealMemoryStore};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
