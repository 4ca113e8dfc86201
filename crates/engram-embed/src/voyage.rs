//! Voyage AI embeddings client
//!
//! HTTP client for the Voyage `POST /v1/embeddings` endpoint with typed
//! request/response structs and the shared [`BackoffPolicy`]. Responses
//! are validated at the boundary: anything that does not match the
//! documented shape becomes `EmbedError::MalformedResponse`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::backoff::BackoffPolicy;
use crate::error::EmbedError;
use crate::provider::{EmbeddingMode, EmbeddingProvider};
use crate::Result;

const DEFAULT_API_URL: &str = "https://api.voyageai.com";
const DEFAULT_MODEL: &str = "voyage-2";

/// Known model → dimension mapping. A model outside this table requires
/// an explicit dimension via [`VoyageConfig::with_dimension`].
fn model_dimension(model: &str) -> Option<usize> {
    match model {
        "voyage-2" => Some(1024),
        "voyage-code-2" => Some(1024),
        "voyage-law-2" => Some(1024),
        "voyage-multilingual-2" => Some(1024),
        "voyage-large-2" => Some(1536),
        _ => None,
    }
}

/// Voyage client configuration
#[derive(Debug, Clone)]
pub struct VoyageConfig {
    /// API base URL (no trailing slash)
    pub api_url: String,
    /// Bearer token
    pub api_key: String,
    /// Embedding model name
    pub model: String,
    /// Explicit dimension override for models not in the builtin table
    pub dimension: Option<usize>,
    /// Per-request deadline
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub backoff: BackoffPolicy,
}

impl VoyageConfig {
    /// Create a config for the given API key with defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            dimension: None,
            timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - VOYAGE_API_KEY (required)
    /// - VOYAGE_API_URL (optional, default: "https://api.voyageai.com")
    /// - VOYAGE_MODEL (optional, default: "voyage-2")
    /// - VOYAGE_TIMEOUT_SECS (optional, default: 30)
    pub fn from_env() -> std::result::Result<Self, String> {
        let api_key = std::env::var("VOYAGE_API_KEY").map_err(|_| "VOYAGE_API_KEY not set")?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("VOYAGE_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("VOYAGE_MODEL") {
            config.model = model;
        }
        if let Ok(secs) = std::env::var("VOYAGE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config.timeout = Duration::from_secs(secs);
            }
        }
        Ok(config)
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set an explicit dimension (for models not in the builtin table)
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Set the retry policy
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for the Voyage embeddings API
pub struct VoyageClient {
    config: VoyageConfig,
    dimension: usize,
    http_client: reqwest::Client,
}

impl VoyageClient {
    /// Create a new client. Fails when the model is unknown and no
    /// explicit dimension was configured.
    pub fn new(config: VoyageConfig) -> Result<Self> {
        let dimension = config
            .dimension
            .or_else(|| model_dimension(&config.model))
            .ok_or_else(|| {
                EmbedError::MalformedResponse(format!(
                    "Unknown embedding model '{}' and no explicit dimension configured",
                    config.model
                ))
            })?;

        let http_client = reqwest::Client::builder()
            .user_agent("engram-embed/0.2.0")
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbedError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            dimension,
            http_client,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = VoyageConfig::from_env().map_err(|e| EmbedError::Network(e.to_string()))?;
        Self::new(config)
    }

    /// One POST to the embeddings endpoint, no retries.
    async fn request_once(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.config.api_url);
        let body = EmbeddingsRequest {
            input: texts,
            model: &self.config.model,
            input_type: mode.as_str(),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbedError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    EmbedError::from(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::RateLimited(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::MalformedResponse(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::MalformedResponse(format!(
                "Expected {} embeddings, provider returned {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // Provider may return out of order; the index field is authoritative.
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for datum in parsed.data {
            if datum.embedding.len() != self.dimension {
                return Err(EmbedError::MalformedResponse(format!(
                    "Embedding has dimension {} but model '{}' produces {}",
                    datum.embedding.len(),
                    self.config.model,
                    self.dimension
                )));
            }
            let slot = vectors.get_mut(datum.index).ok_or_else(|| {
                EmbedError::MalformedResponse(format!("Embedding index {} out of range", datum.index))
            })?;
            *slot = Some(datum.embedding);
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    EmbedError::MalformedResponse(format!("Missing embedding for input {}", i))
                })
            })
            .collect()
    }

    /// Request with retry: transient failures back off and retry up to
    /// the policy bound, then surface as `Unavailable` carrying the last
    /// underlying error.
    #[instrument(skip(self, texts), fields(batch = texts.len(), mode = mode.as_str()))]
    async fn request_with_retry(
        &self,
        texts: &[String],
        mode: EmbeddingMode,
    ) -> Result<Vec<Vec<f32>>> {
        let policy = &self.config.backoff;
        let mut last: Option<EmbedError> = None;

        for attempt in 0..policy.max_attempts {
            match self.request_once(texts, mode).await {
                Ok(vectors) => {
                    debug!(attempt, "Embeddings request succeeded");
                    return Ok(vectors);
                }
                Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Transient embeddings failure, backing off"
                    );
                    policy.wait(attempt).await;
                    last = Some(e);
                }
                Err(e) if e.is_retryable() => {
                    return Err(EmbedError::Unavailable {
                        attempts: policy.max_attempts,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        // Only reachable with max_attempts == 0; treat as exhausted.
        Err(EmbedError::Unavailable {
            attempts: policy.max_attempts,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageClient {
    async fn embed(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput);
        }
        let texts = [text.to_string()];
        let mut vectors = self.request_with_retry(&texts, mode).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::MalformedResponse("Empty embedding result".to_string()))
    }

    async fn embed_many(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbedError::InvalidInput);
        }

        // Memoize duplicates within the batch: each distinct text goes
        // over the wire once, then vectors are re-expanded to input order.
        let mut unique: Vec<String> = Vec::new();
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        for text in texts {
            if !slot_of.contains_key(text.as_str()) {
                slot_of.insert(text.as_str(), unique.len());
                unique.push(text.clone());
            }
        }

        let vectors = self.request_with_retry(&unique, mode).await?;
        Ok(texts
            .iter()
            .map(|t| vectors[slot_of[t.as_str()]].clone())
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
