//! In-memory fake for the agent collaborator (testing only)

use async_trait::async_trait;
use std::sync::Mutex;

use crate::agent::{AgentClient, AgentInfo, AgentMessage, MemoryBlock};
use crate::error::AgentError;

/// Scripted agent: returns fixed state, records prompts sent to it.
pub struct FakeAgentClient {
    blocks: Vec<MemoryBlock>,
    messages: Vec<AgentMessage>,
    info: Option<AgentInfo>,
    reply: String,
    unreachable: bool,
    sent: Mutex<Vec<String>>,
}

impl FakeAgentClient {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            messages: Vec::new(),
            info: None,
            reply: "ok".to_string(),
            unreachable: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<MemoryBlock>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_messages(mut self, messages: Vec<AgentMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_info(mut self, info: AgentInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    /// Every call fails as if the service were down.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Prompts passed to `send`, in order.
    pub fn sent_prompts(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<(), AgentError> {
        if self.unreachable {
            Err(AgentError::Http("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for FakeAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn get_memory_blocks(&self) -> Result<Vec<MemoryBlock>, AgentError> {
        self.check_reachable()?;
        Ok(self.blocks.clone())
    }

    async fn get_messages(&self, limit: usize) -> Result<Vec<AgentMessage>, AgentError> {
        self.check_reachable()?;
        Ok(self.messages.iter().take(limit).cloned().collect())
    }

    async fn agent_info(&self) -> Result<AgentInfo, AgentError> {
        self.check_reachable()?;
        self.info
            .clone()
            .ok_or_else(|| AgentError::Api {
                status: 404,
                message: "no agent info scripted".to_string(),
            })
    }

    async fn send(&self, prompt: &str) -> Result<String, AgentError> {
        self.check_reachable()?;
        self.sent.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}
