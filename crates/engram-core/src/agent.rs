//! Agent collaborator client
//!
//! The conversational agent is an external service behind a narrow,
//! read-mostly interface: fetch memory blocks, fetch message history,
//! fetch agent descriptors, send a prompt. Responses are validated into
//! typed structs at this boundary; anything malformed becomes
//! `AgentError::MalformedResponse` instead of an untyped map leaking
//! inward.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use engram_embed::BackoffPolicy;

use crate::error::AgentError;

type AgentResult<T> = std::result::Result<T, AgentError>;

/// A core memory block (label + content) of the remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub label: String,
    pub value: String,
}

/// One message from the agent's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Option<String>,
    pub role: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the message carried tool-call traces
    pub has_tool_calls: bool,
}

/// Descriptors of the remote agent itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub system: Option<String>,
}

/// Read current agent state; send a prompt. The engine never mutates
/// agent-side state through this trait.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Current core memory blocks.
    async fn get_memory_blocks(&self) -> AgentResult<Vec<MemoryBlock>>;

    /// Most recent messages, newest last, at most `limit`.
    async fn get_messages(&self, limit: usize) -> AgentResult<Vec<AgentMessage>>;

    /// Agent descriptors (name, description, system prompt).
    async fn agent_info(&self) -> AgentResult<AgentInfo>;

    /// Send a prompt and return the agent's reply text.
    async fn send(&self, prompt: &str) -> AgentResult<String>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Agent API configuration
#[derive(Debug, Clone)]
pub struct AgentApiConfig {
    /// API base URL (no trailing slash)
    pub base_url: String,
    /// Bearer token
    pub api_token: String,
    /// Agent to operate on
    pub agent_id: String,
    /// Per-request deadline
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub backoff: BackoffPolicy,
}

impl AgentApiConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            agent_id: agent_id.into(),
            timeout: Duration::from_secs(60),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - AGENT_API_TOKEN (required)
    /// - AGENT_API_URL (optional, default: "https://api.letta.com")
    /// - AGENT_TIMEOUT_SECS (optional, default: 60)
    pub fn from_env(agent_id: impl Into<String>) -> std::result::Result<Self, String> {
        let api_token = std::env::var("AGENT_API_TOKEN").map_err(|_| "AGENT_API_TOKEN not set")?;
        let base_url = std::env::var("AGENT_API_URL")
            .unwrap_or_else(|_| "https://api.letta.com".to_string());
        let mut config = Self::new(base_url.trim_end_matches('/'), api_token, agent_id);
        if let Ok(secs) = std::env::var("AGENT_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config.timeout = Duration::from_secs(secs);
            }
        }
        Ok(config)
    }
}

/// Specification for creating a new remote agent (`engram setup`).
#[derive(Debug, Clone, Serialize)]
pub struct AgentSpec {
    pub name: String,
    /// Initial `human` memory block
    pub human: String,
    /// Initial `persona` memory block
    pub persona: String,
    pub model: String,
    pub embedding: String,
    pub enable_sleeptime: bool,
}

impl Default for AgentSpec {
    fn default() -> Self {
        Self {
            name: "Engram Research Agent".to_string(),
            human: "The user is seeking research assistance and benefits from \
                    the agent remembering previous conversations."
                .to_string(),
            persona: "A research assistant with durable cross-session memory."
                .to_string(),
            model: "anthropic/claude-3-5-sonnet-20241022".to_string(),
            embedding: "openai/text-embedding-3-small".to_string(),
            enable_sleeptime: true,
        }
    }
}

// Raw wire shapes: every field optional, validated on conversion.

#[derive(Debug, Deserialize)]
struct RawBlock {
    label: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: Option<String>,
    role: Option<String>,
    #[serde(alias = "content")]
    text: Option<String>,
    created_at: Option<DateTime<Utc>>,
    tool_calls: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    messages: Option<Vec<RawMessage>>,
}

/// HTTP client for a Letta-style agent API.
pub struct HttpAgentClient {
    config: AgentApiConfig,
    http_client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(config: AgentApiConfig) -> AgentResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent("engram-core/0.2.0")
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// GET with retry on transient failures.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AgentResult<T> {
        let policy = self.config.backoff.clone();
        let mut attempt = 0;
        loop {
            let result = self.get_json_once(path).await;
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                    warn!(path, attempt = attempt + 1, error = %e, "Retrying agent request");
                    policy.wait(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json_once<T: DeserializeOwned>(&self, path: &str) -> AgentResult<T> {
        let response = self
            .http_client
            .get(self.url(path))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// POST with retry on transient failures.
    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AgentResult<T> {
        let policy = self.config.backoff.clone();
        let mut attempt = 0;
        loop {
            let result = self.post_json_once(path, body).await;
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                    warn!(path, attempt = attempt + 1, error = %e, "Retrying agent request");
                    policy.wait(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_json_once<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AgentResult<T> {
        let response = self
            .http_client
            .post(self.url(path))
            .bearer_auth(&self.config.api_token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AgentResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))
    }

    /// Create a new remote agent and return its descriptors. Used by
    /// `engram setup`, not by the sync/retrieval engine.
    #[instrument(skip(self, spec), fields(name = %spec.name))]
    pub async fn create_agent(&self, spec: &AgentSpec) -> AgentResult<AgentInfo> {
        let body = serde_json::json!({
            "name": spec.name,
            "memory_blocks": [
                { "label": "human", "value": spec.human, "limit": 5000 },
                { "label": "persona", "value": spec.persona, "limit": 5000 },
            ],
            "model": spec.model,
            "embedding": spec.embedding,
            "enable_sleeptime": spec.enable_sleeptime,
        });
        let raw: RawAgent = self.post_json("/v1/agents", &body).await?;
        validate_agent(raw)
    }
}

fn validate_block(raw: RawBlock) -> AgentResult<MemoryBlock> {
    let label = raw
        .label
        .ok_or_else(|| AgentError::MalformedResponse("memory block missing label".to_string()))?;
    let value = raw
        .value
        .ok_or_else(|| AgentError::MalformedResponse("memory block missing value".to_string()))?;
    Ok(MemoryBlock { label, value })
}

fn validate_agent(raw: RawAgent) -> AgentResult<AgentInfo> {
    let id = raw
        .id
        .ok_or_else(|| AgentError::MalformedResponse("agent missing id".to_string()))?;
    Ok(AgentInfo {
        id,
        name: raw.name,
        description: raw.description,
        system: raw.system,
    })
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    #[instrument(skip(self))]
    async fn get_memory_blocks(&self) -> AgentResult<Vec<MemoryBlock>> {
        let path = format!("/v1/agents/{}/core-memory/blocks", self.config.agent_id);
        let raw: Vec<RawBlock> = self.get_json(&path).await?;

        let mut blocks = Vec::with_capacity(raw.len());
        for block in raw {
            let block = validate_block(block)?;
            // Empty blocks carry nothing worth persisting.
            if !block.value.trim().is_empty() {
                blocks.push(block);
            }
        }
        debug!(count = blocks.len(), "Fetched memory blocks");
        Ok(blocks)
    }

    #[instrument(skip(self))]
    async fn get_messages(&self, limit: usize) -> AgentResult<Vec<AgentMessage>> {
        let path = format!(
            "/v1/agents/{}/messages?limit={}",
            self.config.agent_id, limit
        );
        let raw: Vec<RawMessage> = self.get_json(&path).await?;

        let messages = raw
            .into_iter()
            .filter_map(|m| {
                let text = m.text?;
                if text.trim().is_empty() {
                    return None;
                }
                Some(AgentMessage {
                    id: m.id,
                    role: m.role.unwrap_or_else(|| "unknown".to_string()),
                    text,
                    timestamp: m.created_at,
                    has_tool_calls: m
                        .tool_calls
                        .as_ref()
                        .map(|v| !v.is_null())
                        .unwrap_or(false),
                })
            })
            .collect::<Vec<_>>();
        debug!(count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn agent_info(&self) -> AgentResult<AgentInfo> {
        let path = format!("/v1/agents/{}", self.config.agent_id);
        let raw: RawAgent = self.get_json(&path).await?;
        validate_agent(raw)
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn send(&self, prompt: &str) -> AgentResult<String> {
        let path = format!("/v1/agents/{}/messages", self.config.agent_id);
        let body = serde_json::json!({
            "messages": [{ "role": "user", "content": prompt }],
        });
        let raw: RawReply = self.post_json(&path, &body).await?;

        let reply = raw
            .messages
            .unwrap_or_default()
            .into_iter()
            .rev()
            .filter(|m| m.role.as_deref() == Some("assistant"))
            .find_map(|m| m.text)
            .ok_or_else(|| {
                AgentError::MalformedResponse("reply contained no assistant message".to_string())
            })?;
        Ok(reply)
    }
}
