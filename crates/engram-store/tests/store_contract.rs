//! Trait contract tests for MemoryStore.
//!
//! These tests verify the behavioral contract using the in-memory fake.
//! Any conforming implementation must pass these.

use std::sync::Arc;

use engram_embed::FakeEmbedder;
use engram_store::{
    Fingerprint, InMemoryMemoryStore, IndexSpec, MemoryMetadata, MemoryStore, StoreError,
};

fn metadata(source: &str, role: &str) -> MemoryMetadata {
    let mut m = MemoryMetadata::new();
    m.insert("source".into(), source.into());
    m.insert("role".into(), role.into());
    m
}

fn fake_store() -> InMemoryMemoryStore {
    InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64)))
}

// ===========================================================================
// Insert contract
// ===========================================================================

#[tokio::test]
async fn insert_returns_complete_record() {
    let store = fake_store();
    let record = store
        .insert("hello world", metadata("chat", "user"))
        .await
        .unwrap();

    assert_eq!(record.text, "hello world");
    assert_eq!(record.embedding.len(), 64);
    assert_eq!(record.embedding_model, "fake-bow");
    assert_eq!(record.source(), Some("chat"));
}

#[tokio::test]
async fn insert_assigns_non_decreasing_timestamps() {
    let store = fake_store();
    let a = store.insert("first", metadata("chat", "user")).await.unwrap();
    let b = store.insert("second", metadata("chat", "user")).await.unwrap();
    assert!(b.created_at >= a.created_at);
}

#[tokio::test]
async fn insert_rejects_empty_text() {
    let store = fake_store();
    let err = store.insert("", metadata("chat", "user")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert!(store.is_empty());
}

// ===========================================================================
// Fingerprint / cursor contract
// ===========================================================================

#[tokio::test]
async fn known_fingerprints_reflect_inserts() {
    let store = fake_store();
    assert!(store.known_fingerprints().await.unwrap().is_empty());

    store
        .insert("remember this", metadata("chat", "user"))
        .await
        .unwrap();

    let fingerprints = store.known_fingerprints().await.unwrap();
    assert_eq!(fingerprints.len(), 1);
    let expected = Fingerprint::of_memory("remember this", &metadata("chat", "user"));
    assert!(fingerprints.contains(&expected));
}

#[tokio::test]
async fn same_content_same_fingerprint_across_inserts() {
    let store = fake_store();
    let a = store
        .insert("repeated message", metadata("chat_history", "user"))
        .await
        .unwrap();
    let b = store
        .insert("repeated message", metadata("chat_history", "user"))
        .await
        .unwrap();

    // The store itself appends; dedupe is the sync cursor's job.
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(store.len(), 2);
    assert_eq!(store.known_fingerprints().await.unwrap().len(), 1);
}

// ===========================================================================
// Search contract
// ===========================================================================

#[tokio::test]
async fn empty_store_search_is_ok_and_empty() {
    let store = fake_store();
    let response = store.search("anything", 5).await.unwrap();
    assert!(response.hits.is_empty());
}

#[tokio::test]
async fn fake_store_without_index_uses_fallback() {
    let store = InMemoryMemoryStore::new(Arc::new(FakeEmbedder::new(64)));
    store
        .insert("quantum computing notes", metadata("chat", "user"))
        .await
        .unwrap();

    let response = store.search("quantum", 5).await.unwrap();
    assert!(response.used_fallback);
    assert_eq!(response.hits.len(), 1);

    // Provision the index: same query now takes the vector path.
    let spec = IndexSpec::cosine(64);
    store.ensure_index(&spec).await.unwrap();
    let response = store.search("quantum", 5).await.unwrap();
    assert!(!response.used_fallback);
    assert!(response.hits[0].score > 0.0);
}

#[tokio::test]
async fn ensure_index_noop_when_equivalent_exists() {
    let store = InMemoryMemoryStore::new(Arc::new(FakeEmbedder::new(64)));
    let spec = IndexSpec::cosine(64);
    store.ensure_index(&spec).await.unwrap();
    store.ensure_index(&spec).await.unwrap();
}

#[tokio::test]
async fn ensure_index_rejects_dimension_mismatch() {
    let store = InMemoryMemoryStore::new(Arc::new(FakeEmbedder::new(64)));
    let err = store.ensure_index(&IndexSpec::cosine(1536)).await.unwrap_err();
    assert!(matches!(err, StoreError::DimensionMismatch { .. }));
}

// ===========================================================================
// Stats contract
// ===========================================================================

#[tokio::test]
async fn stats_break_down_by_source() {
    let store = fake_store();
    store.insert("one", metadata("chat_history", "user")).await.unwrap();
    store.insert("two", metadata("chat_history", "assistant")).await.unwrap();
    store.insert("three", metadata("web_search", "")).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_source.get("chat_history"), Some(&2));
    assert_eq!(stats.by_source.get("web_search"), Some(&1));
    assert!(stats.latest_created_at.is_some());
}
