//! Integration tests for insert + vector search on the SurrealDB store
//!
//! Runs against the embedded `mem://` engine with the deterministic
//! fake embedder, so no network or model download is involved.

use std::sync::Arc;

use engram_embed::FakeEmbedder;
use engram_store::{IndexSpec, MemoryMetadata, MemoryStore, StoreError, SurrealMemoryStore};

fn metadata(source: &str) -> MemoryMetadata {
    let mut m = MemoryMetadata::new();
    m.insert("source".into(), source.into());
    m
}

async fn indexed_store() -> SurrealMemoryStore {
    let embedder = Arc::new(FakeEmbedder::new(64));
    let store = SurrealMemoryStore::in_memory(embedder).await.unwrap();
    let spec = store.index_spec().clone();
    store.ensure_index(&spec).await.unwrap();
    store
}

#[tokio::test]
async fn first_session_scenario() {
    let store = indexed_store().await;

    // Empty store: empty result, not an error
    let response = store.search("quantum finance", 5).await.unwrap();
    assert!(response.hits.is_empty());
    assert!(!response.used_fallback);

    let inserted = store
        .insert("Discussed quantum computing in finance", metadata("chat"))
        .await
        .unwrap();
    assert_eq!(inserted.embedding_dimension, 64);

    let response = store.search("quantum finance", 5).await.unwrap();
    assert_eq!(response.hits.len(), 1);
    assert!(response.hits[0].score > 0.0);
    assert_eq!(
        response.hits[0].memory.text,
        "Discussed quantum computing in finance"
    );
    assert!(!response.used_fallback);
}

#[tokio::test]
async fn insert_rejects_empty_text() {
    let store = indexed_store().await;
    let err = store.insert("   \t", metadata("chat")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[tokio::test]
async fn search_rejects_bad_arguments() {
    let store = indexed_store().await;
    assert!(matches!(
        store.search("  ", 5).await.unwrap_err(),
        StoreError::InvalidInput(_)
    ));
    assert!(matches!(
        store.search("query", 0).await.unwrap_err(),
        StoreError::InvalidInput(_)
    ));
}

#[tokio::test]
async fn search_scores_are_non_increasing() {
    let store = indexed_store().await;

    store
        .insert("rust async runtime internals", metadata("chat"))
        .await
        .unwrap();
    store
        .insert("rust borrow checker and lifetimes", metadata("chat"))
        .await
        .unwrap();
    store
        .insert("gardening tips for spring", metadata("chat"))
        .await
        .unwrap();

    let response = store.search("rust lifetimes", 3).await.unwrap();
    assert!(!response.hits.is_empty());
    for pair in response.hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
        if (pair[0].score - pair[1].score).abs() < f32::EPSILON {
            assert!(pair[0].memory.created_at >= pair[1].memory.created_at);
        }
    }
}

#[tokio::test]
async fn search_truncates_to_top_k() {
    let store = indexed_store().await;
    for i in 0..5 {
        store
            .insert(&format!("memory about rust topic {i}"), metadata("chat"))
            .await
            .unwrap();
    }

    let response = store.search("rust topic", 2).await.unwrap();
    assert_eq!(response.hits.len(), 2);
}

#[tokio::test]
async fn every_record_has_the_store_dimension() {
    let store = indexed_store().await;
    let a = store.insert("first memory", metadata("chat")).await.unwrap();
    let b = store.insert("second memory", metadata("web_search")).await.unwrap();
    assert_eq!(a.embedding.len(), 64);
    assert_eq!(b.embedding.len(), 64);
    assert_eq!(a.embedding_dimension, b.embedding_dimension);
}

#[tokio::test]
async fn ensure_index_is_idempotent() {
    let embedder = Arc::new(FakeEmbedder::new(64));
    let store = SurrealMemoryStore::in_memory(embedder).await.unwrap();
    let spec = store.index_spec().clone();

    store.ensure_index(&spec).await.unwrap();
    store.ensure_index(&spec).await.unwrap();

    store.insert("after index", metadata("chat")).await.unwrap();
    store.ensure_index(&spec).await.unwrap();
}

#[tokio::test]
async fn known_fingerprints_scan_matches_inserts() {
    let store = indexed_store().await;
    assert!(store.known_fingerprints().await.unwrap().is_empty());

    let a = store.insert("first memory", metadata("chat")).await.unwrap();
    let b = store.insert("second memory", metadata("chat")).await.unwrap();

    let fingerprints = store.known_fingerprints().await.unwrap();
    assert_eq!(fingerprints.len(), 2);
    assert!(fingerprints.contains(&a.fingerprint));
    assert!(fingerprints.contains(&b.fingerprint));
}

#[tokio::test]
async fn ensure_index_rejects_wrong_dimension() {
    let store = indexed_store().await;
    let wrong = IndexSpec::cosine(1536);
    let err = store.ensure_index(&wrong).await.unwrap_err();
    assert!(matches!(err, StoreError::DimensionMismatch { .. }));
}
