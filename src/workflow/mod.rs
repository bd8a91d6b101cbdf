//! Workflow orchestration engine.
//!
//! This module sequences heterogeneous units of work (agent-delegated
//! tasks and plain functions) over a dependency DAG: cycle detection at
//! construction time, bounded-concurrency batches of independent steps,
//! and failure propagation (required vs. optional steps, transitive skip
//! cascades).
//!
//! # Usage
//!
//! ```ignore
//! use trellis::{Step, Workflow};
//! use serde_json::{json, Map};
//! use std::sync::Arc;
//!
//! let mut workflow = Workflow::new("research");
//! workflow.add_step("gather", Step::agent("gather", agent, "Research {topic}"))?;
//! workflow.add_step(
//!     "summarize",
//!     Step::agent("summarize", agent2, "Summarize the findings")
//!         .map_output("content", "summary"),
//! )?;
//! workflow.add_dependency("summarize", "gather")?;
//!
//! let result = workflow.execute(input).await;
//! println!("success: {}", result.is_successful());
//! println!("summary: {:?}", result.output().get("summary"));
//! ```

pub mod engine;
mod executor;
pub mod graph;
pub mod result;
pub mod step;

pub use engine::{Workflow, DEFAULT_MAX_PARALLEL_STEPS};
pub use graph::DependencyGraph;
pub use result::WorkflowResult;
pub use step::{FunctionErrorPolicy, Step, StepFn, StepKind};
