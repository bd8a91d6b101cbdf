//! # Trellis - Workflow Orchestration Engine
//!
//! A DAG-based step scheduler for multi-agent systems: heterogeneous units
//! of work (agent-delegated tasks or plain functions) sequenced by a
//! dependency graph, executed in bounded-concurrency batches, with cycle
//! detection at construction time and required/optional failure semantics.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::{Step, Workflow};
//! use serde_json::{json, Map, Value};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut workflow = Workflow::new("report");
//!
//!     // An agent step; `{topic}` is interpolated from the input.
//!     workflow
//!         .add_step("gather", Step::agent("gather", researcher, "Research {topic}"))
//!         .unwrap();
//!
//!     // A function step depending on the agent step.
//!     workflow
//!         .add_step(
//!             "count",
//!             Step::function("count", |_, prior| async move {
//!                 Ok(json!({ "sources": prior.len() }))
//!             })
//!             .map_output("sources", "source_count"),
//!         )
//!         .unwrap();
//!     workflow.add_dependency("count", "gather").unwrap();
//!
//!     let mut input = Map::new();
//!     input.insert("topic".to_string(), Value::String("rust".to_string()));
//!
//!     let result = workflow.execute(input).await;
//!     assert!(result.is_successful());
//! }
//! ```
//!
//! ## Declarative Workflows
//!
//! Workflows can also be defined in TOML and built against a set of named
//! agents; see [`utils::toml_config`].
//!
//! ## Modules
//!
//! - [`workflow`] - Dependency graph, steps, scheduler, and results
//! - [`agents`] - The agent collaborator contract
//! - [`observe`] - Logger and monitor collaborator contracts
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML workflow definitions
//!
//! ## Execution Model
//!
//! A run repeatedly drains the ready set (steps whose dependencies are all
//! resolved) in batches of at most the configured concurrency width. Batch
//! members run concurrently; the batch fully joins before the next ready
//! set is computed. A failed *required* step cascade-skips every
//! transitive dependent; a failed *optional* step affects nothing else.
//! `execute` never fails for ordinary step errors; inspect the returned
//! [`WorkflowResult`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Agent collaborator contract.
pub mod agents;
/// Logger and monitor collaborator contracts.
pub mod observe;
/// Common types and error handling.
pub mod types;
/// Configuration utilities (TOML workflow definitions).
pub mod utils;
/// Workflow engine: graph, steps, scheduler, results.
pub mod workflow;

// Re-export commonly used types
pub use agents::{Agent, AgentResponse};
pub use observe::{Logger, Monitor, MonitorHandle, NoopMonitor, RecordingMonitor, TracingLogger};
pub use types::{
    ExecutionRecord, ExecutionStatus, Result, StepError, StepErrorKind, WorkflowError,
};
pub use utils::toml_config::{
    build_workflow, load_workflow_file, parse_workflow_file, StepConfig, WorkflowFile,
    WorkflowSettings,
};
pub use workflow::{
    DependencyGraph, FunctionErrorPolicy, Step, StepKind, Workflow, WorkflowResult,
};
