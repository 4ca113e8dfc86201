//! Sync coordinator: agent state → memory store, exactly once per item
//!
//! Reads the agent's live memory state, fingerprints every item, and
//! inserts the ones the store has not seen. The cursor is recomputed
//! from stored fingerprints at the start of each run, so re-running
//! sync is idempotent without a separate cursor document.
//!
//! Phases: `Idle → FetchingAgentState → EmbeddingAndStoring → Done`,
//! or `Failed` when the initial agent fetch or the cursor scan fails.
//! Per-item failures never abort the run — they are recorded in the
//! report and the remaining items proceed.

use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use engram_store::{Fingerprint, MemoryMetadata, MemoryStore};

use crate::agent::{AgentClient, AgentInfo, AgentMessage, MemoryBlock};
use crate::error::SyncError;

/// Sync run configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum chat messages fetched per run
    pub message_limit: usize,
    /// Concurrent embed+insert operations
    pub concurrency: usize,
    /// Deadline per item (embedding + durable write)
    pub item_timeout: Duration,
    /// Agent identity recorded in provenance metadata
    pub agent_id: String,
}

impl SyncConfig {
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            message_limit: 100,
            concurrency: 4,
            item_timeout: Duration::from_secs(30),
            agent_id: agent_id.into(),
        }
    }
}

/// Coordinator state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchingAgentState,
    EmbeddingAndStoring,
    Done,
    Failed,
}

/// One item that failed to embed or store during a run.
#[derive(Debug, Clone)]
pub struct SyncItemError {
    pub fingerprint: Fingerprint,
    /// First characters of the item text, for diagnostics
    pub preview: String,
    pub message: String,
}

/// Outcome of one sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub items_synced: usize,
    pub items_skipped: usize,
    pub errors: Vec<SyncItemError>,
    pub duration: Duration,
    pub phase: SyncPhase,
}

impl SyncReport {
    /// The agent produced nothing the store had not already seen.
    pub fn no_new_items(&self) -> bool {
        self.items_synced == 0 && self.errors.is_empty()
    }

    /// Every new item failed to embed or store.
    pub fn all_failed(&self) -> bool {
        self.items_synced == 0 && !self.errors.is_empty()
    }
}

struct SyncItem {
    text: String,
    metadata: MemoryMetadata,
    fingerprint: Fingerprint,
}

/// Pulls agent state and appends unseen items to the store.
pub struct SyncCoordinator {
    agent: Arc<dyn AgentClient>,
    store: Arc<dyn MemoryStore>,
    config: SyncConfig,
    phase: Mutex<SyncPhase>,
}

impl SyncCoordinator {
    /// Explicitly constructed services; lifecycle is one run, not the
    /// process.
    pub fn new(
        agent: Arc<dyn AgentClient>,
        store: Arc<dyn MemoryStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            agent,
            store,
            config,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// Current phase, for observers.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap()
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    /// Run one synchronization pass.
    ///
    /// # TDD: second_run_with_no_new_activity_syncs_nothing
    #[instrument(skip(self), fields(agent_id = %self.config.agent_id))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        self.set_phase(SyncPhase::FetchingAgentState);

        let blocks = match self.agent.get_memory_blocks().await {
            Ok(blocks) => blocks,
            Err(source) => {
                self.set_phase(SyncPhase::Failed);
                return Err(SyncError::AgentUnreachable {
                    step: "memory_blocks",
                    source,
                });
            }
        };

        let messages = match self.agent.get_messages(self.config.message_limit).await {
            Ok(messages) => messages,
            Err(source) => {
                self.set_phase(SyncPhase::Failed);
                return Err(SyncError::AgentUnreachable {
                    step: "messages",
                    source,
                });
            }
        };

        // Agent descriptors are nice-to-have; their absence does not
        // fail the run.
        let info = match self.agent.agent_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "Could not fetch agent descriptors, skipping");
                None
            }
        };

        let items = self.collect_items(blocks, messages, info);
        let total = items.len();

        self.set_phase(SyncPhase::EmbeddingAndStoring);

        let cursor = match self.store.known_fingerprints().await {
            Ok(cursor) => cursor,
            Err(e) => {
                self.set_phase(SyncPhase::Failed);
                return Err(SyncError::Store(e));
            }
        };

        // Skip items already persisted (and duplicates within the same
        // fetch): the fingerprint set is the cursor.
        let mut seen = cursor;
        let mut skipped = 0usize;
        let mut fresh = Vec::new();
        for item in items {
            if seen.contains(&item.fingerprint) {
                skipped += 1;
            } else {
                seen.insert(item.fingerprint.clone());
                fresh.push(item);
            }
        }

        // Items are independent: embed and store with bounded
        // parallelism, one deadline per item.
        let item_timeout = self.config.item_timeout;
        let outcomes: Vec<Result<(), SyncItemError>> = stream::iter(fresh)
            .map(|item| {
                let store = Arc::clone(&self.store);
                async move {
                    let insert = store.insert(&item.text, item.metadata.clone());
                    match tokio::time::timeout(item_timeout, insert).await {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err(e)) => Err(SyncItemError {
                            fingerprint: item.fingerprint,
                            preview: preview(&item.text),
                            message: e.to_string(),
                        }),
                        Err(_) => Err(SyncItemError {
                            fingerprint: item.fingerprint,
                            preview: preview(&item.text),
                            message: format!("timed out after {:?}", item_timeout),
                        }),
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut items_synced = 0usize;
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(()) => items_synced += 1,
                Err(e) => {
                    warn!(
                        fingerprint = e.fingerprint.short(),
                        error = %e.message,
                        "Item failed to sync, continuing"
                    );
                    errors.push(e);
                }
            }
        }

        self.set_phase(SyncPhase::Done);
        let report = SyncReport {
            items_synced,
            items_skipped: skipped,
            errors,
            duration: started.elapsed(),
            phase: SyncPhase::Done,
        };

        info!(
            fetched = total,
            synced = report.items_synced,
            skipped = report.items_skipped,
            errors = report.errors.len(),
            duration_ms = report.duration.as_millis() as u64,
            "Sync complete"
        );
        Ok(report)
    }

    /// Map agent state into store items with provenance metadata.
    fn collect_items(
        &self,
        blocks: Vec<MemoryBlock>,
        messages: Vec<AgentMessage>,
        info: Option<AgentInfo>,
    ) -> Vec<SyncItem> {
        let agent_id = &self.config.agent_id;
        let mut items = Vec::new();

        for block in blocks {
            let mut metadata = MemoryMetadata::new();
            metadata.insert("source".into(), "core_memory".into());
            metadata.insert("type".into(), block.label.clone().into());
            metadata.insert("agent_id".into(), agent_id.as_str().into());
            items.push(make_item(block.value, metadata));
        }

        for message in messages {
            let mut metadata = MemoryMetadata::new();
            metadata.insert("source".into(), "chat_history".into());
            metadata.insert("role".into(), message.role.clone().into());
            metadata.insert("agent_id".into(), agent_id.as_str().into());
            if let Some(id) = &message.id {
                metadata.insert("message_id".into(), id.as_str().into());
            }
            if let Some(ts) = &message.timestamp {
                metadata.insert("timestamp".into(), ts.to_rfc3339().into());
            }
            if message.has_tool_calls {
                metadata.insert("tool_usage".into(), true.into());
            }
            items.push(make_item(message.text, metadata));
        }

        if let Some(info) = info {
            let descriptors = [
                ("agent_name", info.name.map(|n| format!("Agent name: {n}"))),
                (
                    "agent_description",
                    info.description.map(|d| format!("Agent description: {d}")),
                ),
                (
                    "system_prompt",
                    info.system.map(|s| format!("Agent system prompt: {s}")),
                ),
            ];
            for (kind, text) in descriptors {
                if let Some(text) = text {
                    let mut metadata = MemoryMetadata::new();
                    metadata.insert("source".into(), "agent_state".into());
                    metadata.insert("type".into(), kind.into());
                    metadata.insert("agent_id".into(), agent_id.as_str().into());
                    items.push(make_item(text, metadata));
                }
            }
        }

        items
    }
}

fn make_item(text: String, metadata: MemoryMetadata) -> SyncItem {
    let fingerprint = Fingerprint::of_memory(&text, &metadata);
    SyncItem {
        text,
        metadata,
        fingerprint,
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(50) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_text() {
        let long = "x".repeat(200);
        let p = preview(&long);
        assert!(p.len() < 60);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn report_classification() {
        let quiet = SyncReport {
            items_synced: 0,
            items_skipped: 5,
            errors: vec![],
            duration: Duration::from_millis(1),
            phase: SyncPhase::Done,
        };
        assert!(quiet.no_new_items());
        assert!(!quiet.all_failed());

        let broken = SyncReport {
            items_synced: 0,
            items_skipped: 0,
            errors: vec![SyncItemError {
                fingerprint: Fingerprint::from_parts("s", "r", "t"),
                preview: "t".into(),
                message: "boom".into(),
            }],
            duration: Duration::from_millis(1),
            phase: SyncPhase::Done,
        };
        assert!(broken.all_failed());
        assert!(!broken.no_new_items());
    }
}
