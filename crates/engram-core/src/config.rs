//! Persisted agent configuration
//!
//! `agent_config.json` is written once by `engram setup` and read by
//! the sync coordinator and the chat session on every run. It is the
//! only piece of state shared between the setup step and the engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Default location next to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "agent_config.json";

/// Identity of the remote agent the engine synchronizes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Stable agent identifier
    pub agent_id: String,
    /// Multi-agent group, when the agent is sleeptime-enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Free-form agent type label
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
}

fn default_agent_type() -> String {
    "unknown".to_string()
}

/// Load the agent configuration from `path`.
pub fn load_agent_config(path: impl AsRef<Path>) -> Result<AgentConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

    let config: AgentConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    if config.agent_id.trim().is_empty() {
        return Err(ConfigError::MissingField("agent_id".to_string()));
    }

    Ok(config)
}

/// Persist the agent configuration to `path` (pretty-printed JSON).
pub fn save_agent_config(
    config: &AgentConfig,
    path: impl AsRef<Path>,
) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::ParseFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    std::fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
