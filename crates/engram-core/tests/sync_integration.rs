//! Integration tests for the sync coordinator
//!
//! Exercises the idempotence, partial-failure, and duplicate-detection
//! properties against the in-memory store and a scripted agent.

use std::sync::Arc;

use chrono::Utc;
use engram_core::fakes::FakeAgentClient;
use engram_core::{
    AgentInfo, AgentMessage, MemoryBlock, SyncConfig, SyncCoordinator, SyncError, SyncPhase,
};
use engram_embed::{FakeEmbedder, FlakyEmbedder};
use engram_store::{InMemoryMemoryStore, MemoryStore};

fn message(id: &str, role: &str, text: &str) -> AgentMessage {
    AgentMessage {
        id: Some(id.to_string()),
        role: role.to_string(),
        text: text.to_string(),
        timestamp: Some(Utc::now()),
        has_tool_calls: false,
    }
}

fn coordinator(
    agent: FakeAgentClient,
    store: Arc<InMemoryMemoryStore>,
) -> SyncCoordinator {
    SyncCoordinator::new(
        Arc::new(agent),
        store as Arc<dyn MemoryStore>,
        SyncConfig::for_agent("agent-test"),
    )
}

#[tokio::test]
async fn sync_persists_blocks_and_messages_with_provenance() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    let agent = FakeAgentClient::new()
        .with_blocks(vec![MemoryBlock {
            label: "human".to_string(),
            value: "The user enjoys Rust.".to_string(),
        }])
        .with_messages(vec![message("m1", "user", "Tell me about lifetimes")]);

    let report = coordinator(agent, Arc::clone(&store)).sync().await.unwrap();

    assert_eq!(report.items_synced, 2);
    assert_eq!(report.items_skipped, 0);
    assert!(report.errors.is_empty());
    assert_eq!(report.phase, SyncPhase::Done);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_source.get("core_memory"), Some(&1));
    assert_eq!(stats.by_source.get("chat_history"), Some(&1));
}

#[tokio::test]
async fn second_run_with_no_new_activity_syncs_nothing() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    let agent = FakeAgentClient::new().with_messages(vec![
        message("m1", "user", "first message"),
        message("m2", "assistant", "first reply"),
    ]);
    let coordinator = coordinator(agent, Arc::clone(&store));

    let first = coordinator.sync().await.unwrap();
    assert_eq!(first.items_synced, 2);

    let second = coordinator.sync().await.unwrap();
    assert_eq!(second.items_synced, 0);
    assert_eq!(second.items_skipped, 2);
    assert!(second.no_new_items());

    // No duplicate records appeared.
    assert_eq!(store.stats().await.unwrap().total, 2);
}

#[tokio::test]
async fn duplicate_message_in_one_fetch_stores_once() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    // Same role + text twice: identical fingerprint.
    let agent = FakeAgentClient::new().with_messages(vec![
        message("m1", "user", "hello there"),
        message("m2", "user", "hello there"),
    ]);

    let report = coordinator(agent, Arc::clone(&store)).sync().await.unwrap();
    assert_eq!(report.items_synced, 1);
    assert_eq!(report.items_skipped, 1);
    assert_eq!(store.stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn partial_failure_skips_the_bad_item_and_continues() {
    // Embedding the marked item fails permanently; the other two succeed.
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FlakyEmbedder::new(
        64, "UNEMBEDDABLE",
    ))));
    let agent = FakeAgentClient::new().with_messages(vec![
        message("m1", "user", "a perfectly fine message"),
        message("m2", "user", "an UNEMBEDDABLE message"),
        message("m3", "user", "another fine message"),
    ]);

    let report = coordinator(agent, Arc::clone(&store)).sync().await.unwrap();

    assert_eq!(report.items_synced, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("unavailable")
        || report.errors[0].message.to_lowercase().contains("attempts"));
    assert_eq!(report.phase, SyncPhase::Done);
    assert!(!report.all_failed());

    // Exactly the two good records exist.
    assert_eq!(store.stats().await.unwrap().total, 2);
}

#[tokio::test]
async fn unreachable_agent_fails_the_run() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    let coordinator = coordinator(FakeAgentClient::new().unreachable(), Arc::clone(&store));

    let err = coordinator.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::AgentUnreachable { .. }));
    assert_eq!(coordinator.phase(), SyncPhase::Failed);
    assert_eq!(store.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn agent_state_descriptors_are_synced_when_available() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    let agent = FakeAgentClient::new().with_info(AgentInfo {
        id: "agent-test".to_string(),
        name: Some("Research Agent".to_string()),
        description: Some("Helps with research".to_string()),
        system: None,
    });

    let report = coordinator(agent, Arc::clone(&store)).sync().await.unwrap();
    assert_eq!(report.items_synced, 2);
    assert_eq!(
        store.stats().await.unwrap().by_source.get("agent_state"),
        Some(&2)
    );
}

#[tokio::test]
async fn tool_call_messages_get_the_tool_usage_tag() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    let mut with_tools = message("m1", "assistant", "calling the calculator");
    with_tools.has_tool_calls = true;
    let agent = FakeAgentClient::new().with_messages(vec![with_tools]);

    coordinator(agent, Arc::clone(&store)).sync().await.unwrap();

    let response = store.search("calculator", 1).await.unwrap();
    assert_eq!(response.hits.len(), 1);
    assert_eq!(
        response.hits[0].memory.metadata.get("tool_usage"),
        Some(&serde_json::Value::Bool(true))
    );
}

#[tokio::test]
async fn missing_agent_info_is_not_fatal() {
    let store = Arc::new(InMemoryMemoryStore::with_index(Arc::new(FakeEmbedder::new(64))));
    // FakeAgentClient without scripted info returns a 404 from agent_info.
    let agent = FakeAgentClient::new().with_messages(vec![message("m1", "user", "still works")]);

    let report = coordinator(agent, Arc::clone(&store)).sync().await.unwrap();
    assert_eq!(report.items_synced, 1);
    assert_eq!(report.phase, SyncPhase::Done);
}
