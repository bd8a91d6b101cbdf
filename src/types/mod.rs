//! Core types and error handling for the workflow engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Error Types =============

/// Errors produced by workflow construction and execution.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Invalid graph mutation: unknown step id, self-dependency, or a cycle.
    #[error("Graph error: {0}")]
    Graph(String),

    /// A step failed while executing. Captured per-step during a run;
    /// never aborts the run by itself.
    #[error("Step execution error: {0}")]
    StepExecution(String),

    /// The workflow itself is malformed at run start (e.g. no steps).
    #[error("Structural error: {0}")]
    Structural(String),

    /// Invalid declarative configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WorkflowError>;

// ============= Per-Step Error Records =============

/// Classification of a recorded step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepErrorKind {
    /// The step's work itself failed (agent error, propagated function error).
    Execution,
    /// The step exceeded its configured timeout.
    Timeout,
    /// A synthetic error for a workflow that could not start.
    Structural,
}

/// A structured error recorded for a single step during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    /// The step that failed.
    pub step_id: String,
    /// Failure classification.
    pub kind: StepErrorKind,
    /// Human-readable description of the failure.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

// ============= Execution Log =============

/// Terminal status of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The step ran and produced an output.
    Completed,
    /// The step ran and failed. A failed step is resolved, not skipped.
    Failed,
    /// The step never ran (failed required ancestor, or unreachable).
    Skipped,
}

/// One entry in the ordered execution log of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The step this record describes.
    pub step_id: String,
    /// How the step was resolved.
    pub status: ExecutionStatus,
    /// When the step was resolved.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock execution time. Zero for skipped steps.
    pub duration_ms: u64,
    /// Failure message or skip reason, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
