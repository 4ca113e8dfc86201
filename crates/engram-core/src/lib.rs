//! Engram Core Library
//!
//! Re-exports core components for programmatic access to Engram
//! functionality: the sync coordinator, the retrieval formatter, and
//! the agent / web-search collaborator clients.

pub mod agent;
pub mod config;
pub mod error;
pub mod fakes;
pub mod retrieval;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod web_search;

pub use agent::{AgentClient, AgentInfo, AgentMessage, AgentSpec, HttpAgentClient, MemoryBlock};
pub use config::{load_agent_config, save_agent_config, AgentConfig};
pub use error::{AgentError, ConfigError, SessionError, SyncError, WebSearchError};
pub use retrieval::{format_for_prompt, summarize, RetrievalStats, RetrievedContext, Retriever};
pub use session::{ChatSession, SessionStats, TurnOutcome};
pub use sync::{SyncConfig, SyncCoordinator, SyncItemError, SyncPhase, SyncReport};
pub use telemetry::init_tracing;
pub use web_search::{needs_web_search, WebSearchClient, WebSearchConfig, WebSearchOutcome};

pub use engram_embed::{
    BackoffPolicy, EmbeddingMode, EmbeddingProvider, VoyageClient, VoyageConfig,
};
pub use engram_store::{
    Fingerprint, IndexSpec, MemoryMetadata, MemoryStore, SearchHit, SearchResponse, StoreStats,
    StoredMemory, SurrealMemoryStore,
};
