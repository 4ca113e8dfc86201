//! Web search collaborator (Tavily-style API)
//!
//! Consumed by the shell for recency-sensitive queries. Results flow
//! back into the store through the normal `insert` contract, tagged
//! `source = "web_search"`, so they participate in future retrieval
//! like any other memory.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use engram_embed::BackoffPolicy;
use engram_store::{MemoryMetadata, MemoryStore};

use crate::error::WebSearchError;

/// Query terms that indicate the user wants fresh information the
/// memory store cannot have.
const RECENCY_TERMS: &[&str] = &[
    "latest",
    "today",
    "yesterday",
    "current",
    "currently",
    "recent",
    "recently",
    "news",
    "right now",
    "this week",
    "this month",
    "this year",
];

/// Whether a query should trigger the web-search augmentation.
pub fn needs_web_search(query: &str) -> bool {
    let lower = query.to_lowercase();
    RECENCY_TERMS.iter().any(|term| lower.contains(term))
}

/// Web search configuration
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    /// API base URL (no trailing slash)
    pub api_url: String,
    /// Bearer token
    pub api_key: String,
    /// Maximum results per search
    pub max_results: usize,
    /// Per-request deadline
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub backoff: BackoffPolicy,
}

impl WebSearchConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.tavily.com".to_string(),
            api_key: api_key.into(),
            max_results: 5,
            timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - TAVILY_API_KEY (required)
    /// - TAVILY_API_URL (optional, default: "https://api.tavily.com")
    pub fn from_env() -> std::result::Result<Self, String> {
        let api_key = std::env::var("TAVILY_API_KEY").map_err(|_| "TAVILY_API_KEY not set")?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("TAVILY_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequestBody<'a> {
    query: &'a str,
    topic: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
}

/// One web search result.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    /// Tavily calls this field `content`
    #[serde(alias = "content")]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<WebSearchResult>,
}

/// Outcome of one search, with the performance tracking the shell
/// reports in session statistics.
#[derive(Debug, Clone)]
pub struct WebSearchOutcome {
    pub answer: Option<String>,
    pub results: Vec<WebSearchResult>,
    pub elapsed_ms: u64,
}

impl WebSearchOutcome {
    /// Render a prompt block mirroring the memory formatter. Empty
    /// string when the search produced nothing.
    pub fn format_for_prompt(&self) -> String {
        if self.answer.is_none() && self.results.is_empty() {
            return String::new();
        }
        let mut out = String::from("Web search results:\n");
        if let Some(answer) = &self.answer {
            out.push_str(&format!("Answer: {}\n", answer));
        }
        for (i, result) in self.results.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} ({}): {}\n",
                i + 1,
                result.title,
                result.url,
                result.snippet
            ));
        }
        out
    }
}

/// Client for a Tavily-style search API.
pub struct WebSearchClient {
    config: WebSearchConfig,
    http_client: reqwest::Client,
}

impl WebSearchClient {
    pub fn new(config: WebSearchConfig) -> Result<Self, WebSearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent("engram-core/0.2.0")
            .timeout(config.timeout)
            .build()
            .map_err(|e| WebSearchError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self, WebSearchError> {
        let config = WebSearchConfig::from_env().map_err(WebSearchError::Http)?;
        Self::new(config)
    }

    /// Search the web, retrying transient failures.
    #[instrument(skip(self), fields(query_len = query.len()))]
    pub async fn search(&self, query: &str) -> Result<WebSearchOutcome, WebSearchError> {
        let started = Instant::now();
        let policy = self.config.backoff.clone();
        let mut attempt = 0;
        loop {
            match self.search_once(query).await {
                Ok(mut outcome) => {
                    outcome.elapsed_ms = started.elapsed().as_millis() as u64;
                    debug!(
                        results = outcome.results.len(),
                        elapsed_ms = outcome.elapsed_ms,
                        "Web search complete"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                    warn!(attempt = attempt + 1, error = %e, "Retrying web search");
                    policy.wait(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn search_once(&self, query: &str) -> Result<WebSearchOutcome, WebSearchError> {
        let url = format!("{}/search", self.config.api_url);
        let body = SearchRequestBody {
            query,
            topic: "general",
            search_depth: "basic",
            max_results: self.config.max_results,
            include_answer: true,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WebSearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: RawSearchResponse = response
            .json()
            .await
            .map_err(|e| WebSearchError::MalformedResponse(e.to_string()))?;

        Ok(WebSearchOutcome {
            answer: raw.answer.filter(|a| !a.trim().is_empty()),
            results: raw.results,
            elapsed_ms: 0,
        })
    }
}

/// Persist search results as memories. Each snippet (and the direct
/// answer, when present) becomes one record tagged with its origin.
/// Returns the number of records inserted; individual insert failures
/// are logged and skipped so one bad snippet cannot lose the rest.
pub async fn store_results(
    store: &Arc<dyn MemoryStore>,
    query: &str,
    outcome: &WebSearchOutcome,
) -> usize {
    let mut inserted = 0;

    if let Some(answer) = &outcome.answer {
        let mut metadata = MemoryMetadata::new();
        metadata.insert("source".into(), "web_search".into());
        metadata.insert("type".into(), "answer".into());
        metadata.insert("query".into(), query.into());
        match store.insert(answer, metadata).await {
            Ok(_) => inserted += 1,
            Err(e) => warn!(error = %e, "Failed to store web search answer"),
        }
    }

    for result in &outcome.results {
        let mut metadata = MemoryMetadata::new();
        metadata.insert("source".into(), "web_search".into());
        metadata.insert("type".into(), "result".into());
        metadata.insert("query".into(), query.into());
        metadata.insert("title".into(), result.title.as_str().into());
        metadata.insert("url".into(), result.url.as_str().into());
        match store.insert(&result.snippet, metadata).await {
            Ok(_) => inserted += 1,
            Err(e) => warn!(url = %result.url, error = %e, "Failed to store web search result"),
        }
    }

    inserted
}
