//! Engram - Agent Memory CLI
//!
//! The `engram` command drives the memory engine around a remote
//! conversational agent.
//!
//! ## Commands
//!
//! - `setup`: Create the remote agent and write `agent_config.json`
//! - `chat`: Interactive shell with memory-augmented queries
//! - `sync`: One-shot synchronization of agent state into the store
//! - `search`: Query the memory store directly
//! - `stats`: Show collection statistics

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{warn, Level};

use engram_core::agent::AgentApiConfig;
use engram_core::{
    load_agent_config, save_agent_config, AgentConfig, AgentSpec, ChatSession, HttpAgentClient,
    SyncConfig, SyncCoordinator, SyncReport, WebSearchClient,
};
use engram_embed::VoyageClient;
use engram_store::{MemoryStore, SurrealMemoryStore};

#[derive(Parser)]
#[command(name = "engram")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Durable cross-session memory for conversational agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the agent configuration file
    #[arg(long, global = true, default_value = "agent_config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the remote agent and write the agent configuration
    Setup {
        /// Agent display name
        #[arg(short, long, default_value = "Engram Research Agent")]
        name: String,
    },

    /// Interactive chat with memory augmentation
    Chat {
        /// Memories retrieved per query
        #[arg(short, long, default_value_t = 5)]
        top_k: usize,
    },

    /// Synchronize agent state into the memory store
    Sync {
        /// Maximum chat messages fetched
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Search the memory store
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short, long, default_value_t = 5)]
        top_k: usize,
    },

    /// Show memory collection statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    engram_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Setup { name } => cmd_setup(&cli.config, &name).await,
        Commands::Chat { top_k } => cmd_chat(&cli.config, top_k).await,
        Commands::Sync { limit } => cmd_sync(&cli.config, limit).await,
        Commands::Search { query, top_k } => cmd_search(&query, top_k).await,
        Commands::Stats => cmd_stats().await,
    }
}

/// Connect the store with the configured embedding provider and make
/// sure the vector index exists.
async fn open_store() -> Result<Arc<SurrealMemoryStore>> {
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
    Ok(Arc::new(store))
}

fn open_agent(config: &AgentConfig) -> Result<Arc<HttpAgentClient>> {
    let api_config = AgentApiConfig::from_env(&config.agent_id)
        .map_err(|e| anyhow::anyhow!("Agent API not configured: {e}"))?;
    Ok(Arc::new(
        HttpAgentClient::new(api_config).context("Failed to build agent client")?,
    ))
}

async fn cmd_setup(config_path: &PathBuf, name: &str) -> Result<()> {
    let api_config = AgentApiConfig::from_env("")
        .map_err(|e| anyhow::anyhow!("Agent API not configured: {e}"))?;
    let client = HttpAgentClient::new(api_config).context("Failed to build agent client")?;

    let spec = AgentSpec {
        name: name.to_string(),
        ..AgentSpec::default()
    };
    let info = client
        .create_agent(&spec)
        .await
        .context("Failed to create the remote agent")?;

    let config = AgentConfig {
        agent_id: info.id.clone(),
        group_id: None,
        agent_type: "sleep_agent".to_string(),
    };
    save_agent_config(&config, config_path).context("Failed to write agent configuration")?;

    println!("Created agent {} ({})", info.id, name);
    println!("Configuration written to {}", config_path.display());
    Ok(())
}

async fn cmd_sync(config_path: &PathBuf, limit: usize) -> Result<()> {
    let config = load_agent_config(config_path).context("Failed to load agent configuration")?;
    let store = open_store().await?;
    let agent = open_agent(&config)?;

    let mut sync_config = SyncConfig::for_agent(&config.agent_id);
    sync_config.message_limit = limit;

    let coordinator = SyncCoordinator::new(agent, store as Arc<dyn MemoryStore>, sync_config);
    let report = coordinator
        .sync()
        .await
        .context("Synchronization failed")?;

    print_sync_report(&report);
    Ok(())
}

async fn cmd_search(query: &str, top_k: usize) -> Result<()> {
    let store = open_store().await?;
    let response = store.search(query, top_k).await.context("Search failed")?;

    if response.used_fallback {
        println!("(vector index unavailable - keyword fallback was used)");
    }
    if response.hits.is_empty() {
        println!("No matching memories.");
        return Ok(());
    }

    print!("{}", engram_core::format_for_prompt(&response.hits));
    println!("{} result(s) in {}ms", response.hits.len(), response.elapsed_ms);
    Ok(())
}

async fn cmd_stats() -> Result<()> {
    let store = open_store().await?;
    let stats = store.stats().await.context("Failed to read statistics")?;

    println!("Total memories: {}", stats.total);
    if let Some(latest) = stats.latest_created_at {
        println!("Latest insert:  {}", latest.to_rfc3339());
    }
    if !stats.by_source.is_empty() {
        println!("By source:");
        for (source, count) in &stats.by_source {
            println!("  {source}: {count}");
        }
    }
    Ok(())
}

async fn cmd_chat(config_path: &PathBuf, top_k: usize) -> Result<()> {
    let config = load_agent_config(config_path).context("Failed to load agent configuration")?;
    let store = open_store().await?;
    let agent = open_agent(&config)?;

    let web = match WebSearchClient::from_env() {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "Web search disabled");
            None
        }
    };

    let mut session = ChatSession::new(
        agent.clone(),
        Arc::clone(&store) as Arc<dyn MemoryStore>,
        top_k,
        web,
    );

    println!("Engram chat - agent {} ({})", config.agent_id, config.agent_type);
    println!("Type /help for commands, /quit to exit.");

    let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;
    loop {
        match editor.readline("you> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                match line {
                    "/quit" | "/exit" => break,
                    "/help" => print_help(),
                    "/stats" => {
                        let stats = store.stats().await.context("Failed to read statistics")?;
                        let session_stats = session.stats();
                        println!("Stored memories:  {}", stats.total);
                        println!("Queries:          {}", session_stats.queries);
                        println!("Memory hits:      {}", session_stats.memory_hits);
                        println!("Web searches:     {}", session_stats.web_searches);
                        println!(
                            "Hit rate:         {:.0}%",
                            session_stats.memory_hit_rate() * 100.0
                        );
                        println!("Uptime:           {}s", session_stats.uptime().as_secs());
                    }
                    "/sync" => {
                        let mut sync_config = SyncConfig::for_agent(&config.agent_id);
                        sync_config.message_limit = 100;
                        let coordinator = SyncCoordinator::new(
                            agent.clone(),
                            Arc::clone(&store) as Arc<dyn MemoryStore>,
                            sync_config,
                        );
                        match coordinator.sync().await {
                            Ok(report) => print_sync_report(&report),
                            Err(e) => println!("Sync failed: {e}"),
                        }
                    }
                    _ if line.starts_with("/search ") => {
                        let query = line.trim_start_matches("/search ").trim();
                        match store.search(query, top_k).await {
                            Ok(response) => {
                                if response.used_fallback {
                                    println!("(keyword fallback was used)");
                                }
                                if response.hits.is_empty() {
                                    println!("No matching memories.");
                                } else {
                                    print!("{}", engram_core::format_for_prompt(&response.hits));
                                }
                            }
                            Err(e) => println!("Search failed: {e}"),
                        }
                    }
                    _ if line.starts_with('/') => {
                        println!("Unknown command. Type /help for commands.");
                    }
                    query => match session.handle_query(query).await {
                        Ok(outcome) => {
                            if !outcome.memory.hits.is_empty() {
                                println!(
                                    "(using {} memories{})",
                                    outcome.memory.hits.len(),
                                    if outcome.memory.used_fallback {
                                        ", keyword fallback"
                                    } else {
                                        ""
                                    }
                                );
                            }
                            if outcome.web_used {
                                println!(
                                    "(web search stored {} new memories)",
                                    outcome.web_results_stored
                                );
                            }
                            println!("agent> {}", outcome.reply);
                        }
                        Err(e) => println!("Query failed: {e}"),
                    },
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Readline error"),
        }
    }

    let stats = session.stats();
    println!(
        "Session: {} queries, {} memory hits, {} web searches.",
        stats.queries, stats.memory_hits, stats.web_searches
    );
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /sync          synchronize agent state into the store");
    println!("  /search <q>    query the memory store directly");
    println!("  /stats         session and store statistics");
    println!("  /quit          exit");
    println!("Anything else is sent to the agent with memory context.");
}

fn print_sync_report(report: &SyncReport) {
    println!(
        "Synced {} item(s), skipped {} already stored, {} error(s) in {}ms.",
        report.items_synced,
        report.items_skipped,
        report.errors.len(),
        report.duration.as_millis()
    );
    if report.no_new_items() {
        println!("No new agent activity.");
    }
    for error in &report.errors {
        println!("  failed [{}]: {}", error.preview, error.message);
    }
}
