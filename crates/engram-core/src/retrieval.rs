//! Retrieval formatter: search results → prompt-ready context
//!
//! Pure formatting over already-fetched results, plus [`Retriever`],
//! the one-call query path (embed → search → format) used by the shell.

use std::sync::Arc;
use tracing::debug;

use engram_store::{MemoryStore, SearchHit, StoreError};

/// Render hits as a numbered block for prompt injection.
///
/// Returns the empty string — never placeholder text — when there are
/// no hits, so callers can prepend the result unconditionally.
pub fn format_for_prompt(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut out = String::from("Relevant memories:\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. [Score: {:.3}] [Source: {}] {}\n",
            i + 1,
            hit.score,
            hit.memory.source().unwrap_or("unknown"),
            hit.memory.text
        ));
    }
    out
}

/// Summary statistics over retrieval results.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalStats {
    /// Hits returned for the current query
    pub hits: usize,
    /// Queries processed so far
    pub total: usize,
    /// `hits / total`, 0.0 when nothing was queried
    pub hit_rate: f64,
}

/// Pure computation over already-fetched results, no I/O.
pub fn summarize(hits: &[SearchHit], query_count: usize) -> RetrievalStats {
    let hit_count = hits.len();
    RetrievalStats {
        hits: hit_count,
        total: query_count,
        hit_rate: if query_count == 0 {
            0.0
        } else {
            hit_count as f64 / query_count as f64
        },
    }
}

/// Retrieved context for one query.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    /// Prompt block from [`format_for_prompt`]; empty when nothing matched
    pub prompt_block: String,
    pub hits: Vec<SearchHit>,
    /// Whether the store served this query from the keyword fallback
    pub used_fallback: bool,
    pub elapsed_ms: u64,
}

/// Query-time flow over a store: search then format.
pub struct Retriever {
    store: Arc<dyn MemoryStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn MemoryStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext, StoreError> {
        let response = self.store.search(query, self.top_k).await?;
        debug!(
            hits = response.hits.len(),
            used_fallback = response.used_fallback,
            elapsed_ms = response.elapsed_ms,
            "Retrieved memory context"
        );
        Ok(RetrievedContext {
            prompt_block: format_for_prompt(&response.hits),
            used_fallback: response.used_fallback,
            elapsed_ms: response.elapsed_ms,
            hits: response.hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_store::{MemoryMetadata, StoredMemory};

    fn hit(text: &str, source: &str, score: f32) -> SearchHit {
        let mut metadata = MemoryMetadata::new();
        metadata.insert("source".into(), source.into());
        SearchHit {
            memory: StoredMemory::new(text, vec![0.0; 4], metadata, "fake-bow"),
            score,
        }
    }

    #[test]
    fn empty_results_format_to_empty_string() {
        assert_eq!(format_for_prompt(&[]), "");
    }

    #[test]
    fn hits_are_numbered_with_score_and_source() {
        let hits = vec![
            hit("Discussed quantum computing", "chat_history", 0.91234),
            hit("Searched for market news", "web_search", 0.5),
        ];
        let block = format_for_prompt(&hits);
        assert!(block.starts_with("Relevant memories:\n"));
        assert!(block.contains("1. [Score: 0.912] [Source: chat_history] Discussed quantum computing"));
        assert!(block.contains("2. [Score: 0.500] [Source: web_search] Searched for market news"));
    }

    #[test]
    fn missing_source_renders_unknown() {
        let hits = vec![SearchHit {
            memory: StoredMemory::new("untagged", vec![0.0; 4], MemoryMetadata::new(), "fake-bow"),
            score: 0.1,
        }];
        assert!(format_for_prompt(&hits).contains("[Source: unknown]"));
    }

    #[test]
    fn summarize_is_pure_arithmetic() {
        let hits = vec![hit("a", "chat", 0.9), hit("b", "chat", 0.8)];
        let stats = summarize(&hits, 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.total, 4);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn summarize_with_zero_queries() {
        let stats = summarize(&[], 0);
        assert_eq!(stats.hit_rate, 0.0);
    }
}
