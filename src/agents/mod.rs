//! Agent collaborator contract.
//!
//! The engine delegates task steps to external agents but knows nothing
//! about how they are built: LLM clients, tool loops, and memory all live
//! behind this trait. Implementations are injected into agent steps as
//! `Arc<dyn Agent>`.

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured response returned by an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The agent's answer to the task.
    pub content: String,

    /// Provider- or agent-specific metadata (model, token counts, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// How long the agent run took, as reported by the agent.
    pub execution_time_ms: u64,
}

impl AgentResponse {
    /// Build a response with empty metadata.
    pub fn new(content: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            execution_time_ms,
        }
    }
}

/// Base trait for all agents consumed by the workflow engine.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute a task with the given context mapping and return a
    /// structured response. The engine never retries a failed run.
    async fn run(&self, task: &str, context: &Map<String, Value>) -> Result<AgentResponse>;

    /// The agent's name, used in logs and error messages.
    fn name(&self) -> &str;
}
