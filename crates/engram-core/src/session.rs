//! Chat session orchestration
//!
//! One query's flow: retrieve memory context, optionally augment with
//! a web search for recency-sensitive questions, send the combined
//! prompt to the agent, and return the reply with diagnostics. The
//! shell owns I/O; this owns the flow.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use engram_store::MemoryStore;

use crate::agent::AgentClient;
use crate::error::SessionError;
use crate::retrieval::{RetrievedContext, Retriever};
use crate::web_search::{needs_web_search, store_results, WebSearchClient};

/// Counters reported to the user at session end.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub queries: usize,
    /// Queries for which memory retrieval produced at least one hit
    pub memory_hits: usize,
    pub web_searches: usize,
    started: Instant,
}

impl SessionStats {
    fn new() -> Self {
        Self {
            queries: 0,
            memory_hits: 0,
            web_searches: 0,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fraction of queries that found relevant memories.
    pub fn memory_hit_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.memory_hits as f64 / self.queries as f64
        }
    }
}

/// Everything one turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    pub memory: RetrievedContext,
    pub web_used: bool,
    /// Web results persisted as new memories this turn
    pub web_results_stored: usize,
}

/// An interactive session against one agent and one store.
pub struct ChatSession {
    agent: Arc<dyn AgentClient>,
    store: Arc<dyn MemoryStore>,
    retriever: Retriever,
    web: Option<WebSearchClient>,
    stats: SessionStats,
}

impl ChatSession {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        store: Arc<dyn MemoryStore>,
        top_k: usize,
        web: Option<WebSearchClient>,
    ) -> Self {
        let retriever = Retriever::new(Arc::clone(&store), top_k);
        Self {
            agent,
            store,
            retriever,
            web,
            stats: SessionStats::new(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Handle one user query end to end.
    pub async fn handle_query(&mut self, query: &str) -> Result<TurnOutcome, SessionError> {
        self.stats.queries += 1;

        let memory = self.retriever.retrieve(query).await?;
        if !memory.hits.is_empty() {
            self.stats.memory_hits += 1;
        }

        let mut prompt = String::new();
        if !memory.prompt_block.is_empty() {
            prompt.push_str(&memory.prompt_block);
            prompt.push('\n');
        }

        let mut web_used = false;
        let mut web_results_stored = 0;
        if let Some(web) = &self.web {
            if needs_web_search(query) {
                // A failed web search degrades the answer, it does not
                // fail the turn.
                match web.search(query).await {
                    Ok(outcome) => {
                        self.stats.web_searches += 1;
                        web_used = true;
                        web_results_stored = store_results(&self.store, query, &outcome).await;
                        let block = outcome.format_for_prompt();
                        if !block.is_empty() {
                            prompt.push_str(&block);
                            prompt.push('\n');
                        }
                        info!(
                            stored = web_results_stored,
                            elapsed_ms = outcome.elapsed_ms,
                            "Web search augmented the prompt"
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Web search failed, answering from memory only");
                    }
                }
            }
        }

        prompt.push_str(query);
        let reply = self.agent.send(&prompt).await?;

        Ok(TurnOutcome {
            reply,
            memory,
            web_used,
            web_results_stored,
        })
    }
}
