//! Engram sync daemon
//!
//! Periodically synchronizes the remote agent's state into the memory
//! store, so memories accumulate without anyone running `engram sync`
//! by hand. Interval comes from `ENGRAM_SYNC_INTERVAL_SECS` (default
//! 300). A failed pass is logged and the next tick proceeds.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};

use engram_core::agent::AgentApiConfig;
use engram_core::{
    load_agent_config, HttpAgentClient, MemoryStore, SurrealMemoryStore, SyncConfig,
    SyncCoordinator, VoyageClient,
};

const DEFAULT_INTERVAL_SECS: u64 = 300;

fn sync_interval_secs(raw: Option<String>) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .unwrap_or(DEFAULT_INTERVAL_SECS)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    engram_core::init_tracing(false, Level::INFO);

    let interval_secs = sync_interval_secs(std::env::var("ENGRAM_SYNC_INTERVAL_SECS").ok());

    let config =
        load_agent_config("agent_config.json").context("Failed to load agent configuration")?;

    let embedder =
        Arc::new(VoyageClient::from_env().context("Failed to configure embedding provider")?);
    let store = SurrealMemoryStore::from_env(embedder)
        .await
        .context("Failed to connect to the memory store")?;
    let spec = store.index_spec().clone();
    store
        .ensure_index(&spec)
        .await
        .context("Failed to ensure the vector index")?;

    let api_config = AgentApiConfig::from_env(&config.agent_id)
        .map_err(|e| anyhow::anyhow!("Agent API not configured: {e}"))?;
    let agent = Arc::new(HttpAgentClient::new(api_config).context("Failed to build agent client")?);

    let coordinator = SyncCoordinator::new(
        agent,
        Arc::new(store) as Arc<dyn MemoryStore>,
        SyncConfig::for_agent(&config.agent_id),
    );

    info!(
        agent_id = %config.agent_id,
        interval_secs,
        "engramd started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        match coordinator.sync().await {
            Ok(report) => {
                if !report.no_new_items() {
                    info!(
                        synced = report.items_synced,
                        skipped = report.items_skipped,
                        errors = report.errors.len(),
                        "Sync pass complete"
                    );
                }
            }
            Err(e) => {
                error!(error = %e, "Sync pass failed, will retry next tick");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_defaults_and_rejects_zero() {
        assert_eq!(sync_interval_secs(None), DEFAULT_INTERVAL_SECS);
        assert_eq!(sync_interval_secs(Some("60".into())), 60);
        assert_eq!(sync_interval_secs(Some("0".into())), DEFAULT_INTERVAL_SECS);
        assert_eq!(sync_interval_secs(Some("nope".into())), DEFAULT_INTERVAL_SECS);
    }
}
