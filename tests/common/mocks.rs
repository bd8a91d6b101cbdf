//! Mock implementations for testing.
//!
//! This module provides a mock agent that can be used across different
//! test files without duplication.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use trellis::{Agent, AgentResponse, Result, WorkflowError};

/// Mock agent for testing with configurable behavior.
///
/// Records every task it receives (after template interpolation), so tests
/// can assert on what the engine actually handed to the agent.
#[derive(Clone)]
pub struct MockAgent {
    name: String,
    response: String,
    should_fail: bool,
    delay: Option<Duration>,
    tasks: Arc<Mutex<Vec<String>>>,
}

impl MockAgent {
    /// Create a mock agent that answers every task with `response`.
    pub fn new(name: &str, response: &str) -> Self {
        Self {
            name: name.to_string(),
            response: response.to_string(),
            should_fail: false,
            delay: None,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock agent that always fails.
    pub fn failing(name: &str) -> Self {
        Self {
            should_fail: true,
            ..Self::new(name, "")
        }
    }

    /// Sleep for `delay` before answering. Useful for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every task this agent has received, in call order.
    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().clone()
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn run(&self, task: &str, _context: &Map<String, Value>) -> Result<AgentResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tasks.lock().push(task.to_string());
        if self.should_fail {
            return Err(WorkflowError::StepExecution(format!(
                "mock agent '{}' exploded",
                self.name
            )));
        }
        Ok(AgentResponse::new(self.response.clone(), 1))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
