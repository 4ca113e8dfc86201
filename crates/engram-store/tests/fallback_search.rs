//! Fallback behavior when the vector index is not provisioned
//!
//! Removing the index must not make `search` raise — it degrades to
//! keyword matching and says so in the response.

use std::sync::Arc;

use engram_embed::FakeEmbedder;
use engram_store::{MemoryMetadata, MemoryStore, SurrealMemoryStore};

fn metadata(source: &str) -> MemoryMetadata {
    let mut m = MemoryMetadata::new();
    m.insert("source".into(), source.into());
    m
}

async fn unindexed_store() -> SurrealMemoryStore {
    // Deliberately never calls ensure_index.
    let embedder = Arc::new(FakeEmbedder::new(64));
    SurrealMemoryStore::in_memory(embedder).await.unwrap()
}

#[tokio::test]
async fn missing_index_degrades_to_keyword_search() {
    let store = unindexed_store().await;

    store
        .insert("Discussed quantum computing in finance", metadata("chat"))
        .await
        .unwrap();
    store
        .insert("Notes about sourdough baking", metadata("chat"))
        .await
        .unwrap();

    let response = store.search("quantum finance", 5).await.unwrap();
    assert!(response.used_fallback, "diagnostic flag must be set");
    assert_eq!(response.hits.len(), 1);
    assert!(response.hits[0].score > 0.0);
    assert!(response.hits[0].memory.text.contains("quantum"));
}

#[tokio::test]
async fn fallback_with_no_overlap_returns_empty() {
    let store = unindexed_store().await;
    store
        .insert("Notes about sourdough baking", metadata("chat"))
        .await
        .unwrap();

    let response = store.search("astrophysics jets", 5).await.unwrap();
    assert!(response.used_fallback);
    assert!(response.hits.is_empty());
}

#[tokio::test]
async fn fallback_matches_metadata_strings() {
    let store = unindexed_store().await;
    store
        .insert("Result snippet text", metadata("web_search"))
        .await
        .unwrap();

    // "web_search" only appears in metadata, not in the text
    let response = store.search("web_search", 5).await.unwrap();
    assert!(response.used_fallback);
    assert_eq!(response.hits.len(), 1);
}

#[tokio::test]
async fn fallback_ranks_by_term_overlap() {
    let store = unindexed_store().await;
    store
        .insert("rust compiler internals", metadata("chat"))
        .await
        .unwrap();
    store
        .insert("rust compiler borrow checker deep dive", metadata("chat"))
        .await
        .unwrap();

    let response = store.search("rust borrow checker", 5).await.unwrap();
    assert!(response.used_fallback);
    assert_eq!(response.hits.len(), 2);
    // All three query terms hit the second insert; only one hits the first.
    assert!(response.hits[0].memory.text.contains("borrow"));
    assert!(response.hits[0].score > response.hits[1].score);
}

#[tokio::test]
async fn indexed_store_does_not_set_fallback_flag() {
    let embedder = Arc::new(FakeEmbedder::new(64));
    let store = SurrealMemoryStore::in_memory(embedder).await.unwrap();
    let spec = store.index_spec().clone();
    store.ensure_index(&spec).await.unwrap();

    store.insert("hello world", metadata("chat")).await.unwrap();
    let response = store.search("hello", 1).await.unwrap();
    assert!(!response.used_fallback);
}
