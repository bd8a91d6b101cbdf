//! TOML-based workflow definitions.
//!
//! Workflows can be declared in a TOML document and built into a
//! [`Workflow`] against a set of named agents supplied by the caller.
//! Agents are injected explicitly, never resolved from a global registry.
//!
//! Only agent steps are expressible declaratively; function steps wrap
//! Rust closures and stay code-only.
//!
//! # Format
//!
//! ```toml
//! [workflow]
//! name = "research"
//! max_parallel_steps = 2
//!
//! [steps.gather]
//! agent = "researcher"
//! task = "Research {topic}"
//!
//! [steps.summarize]
//! agent = "writer"
//! task = "Summarize the research findings on {topic}"
//! depends_on = ["gather"]
//! required = false
//! timeout_ms = 30000
//!
//! [steps.summarize.output_mapping]
//! content = "summary"
//! ```

use crate::agents::Agent;
use crate::types::{Result, WorkflowError};
use crate::workflow::step::{FunctionErrorPolicy, Step};
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Root document of a workflow definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFile {
    /// Workflow-level settings.
    pub workflow: WorkflowSettings,

    /// Step definitions keyed by step id.
    #[serde(default)]
    pub steps: HashMap<String, StepConfig>,
}

/// The `[workflow]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Workflow name.
    pub name: String,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: String,

    /// Concurrency width for batch execution.
    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps: usize,

    /// How function-step errors are surfaced. Only relevant when the
    /// built workflow is later extended with function steps in code.
    #[serde(default)]
    pub function_error_policy: FunctionErrorPolicy,
}

/// One `[steps.<id>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Name of the agent that executes this step.
    pub agent: String,

    /// Task template; `{field}` tokens are interpolated from the step
    /// input.
    pub task: String,

    /// Optional step description.
    #[serde(default)]
    pub description: Option<String>,

    /// Whether a failure of this step cascades to dependents.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Per-step execution bound in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Ids of steps this step depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// workflow field -> step field renames.
    #[serde(default)]
    pub input_mapping: HashMap<String, String>,

    /// step field -> workflow field renames.
    #[serde(default)]
    pub output_mapping: HashMap<String, String>,
}

fn default_max_parallel_steps() -> usize {
    crate::workflow::DEFAULT_MAX_PARALLEL_STEPS
}

fn default_required() -> bool {
    true
}

/// Parse a workflow definition from TOML text.
pub fn parse_workflow_file(content: &str) -> Result<WorkflowFile> {
    toml::from_str(content)
        .map_err(|e| WorkflowError::Configuration(format!("invalid workflow TOML: {}", e)))
}

/// Load and parse a workflow definition file.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WorkflowError::Configuration(format!(
            "failed to read workflow file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_workflow_file(&content)
}

/// Build an executable [`Workflow`] from a parsed definition.
///
/// Agent names are resolved against `agents`; an unknown agent, an unknown
/// dependency id, or a dependency cycle fails the build with a
/// configuration error and no partially built workflow escapes.
pub fn build_workflow(
    file: &WorkflowFile,
    agents: &HashMap<String, Arc<dyn Agent>>,
) -> Result<Workflow> {
    let settings = &file.workflow;
    let mut workflow =
        Workflow::new(settings.name.clone()).with_description(settings.description.clone());

    workflow
        .set_max_parallel_steps(settings.max_parallel_steps)
        .map_err(|e| {
            WorkflowError::Configuration(format!("workflow '{}': {}", settings.name, e))
        })?;
    workflow.set_function_error_policy(settings.function_error_policy);

    // TOML tables deserialize into a HashMap, so impose a stable insertion
    // order; execution tie-breaks follow it.
    let mut step_ids: Vec<&String> = file.steps.keys().collect();
    step_ids.sort();

    for id in &step_ids {
        let config = &file.steps[*id];
        let agent = agents.get(&config.agent).ok_or_else(|| {
            WorkflowError::Configuration(format!(
                "step '{}' references unknown agent '{}'",
                id, config.agent
            ))
        })?;

        let mut step = Step::agent(id.as_str(), Arc::clone(agent), config.task.clone())
            .with_required(config.required);
        if let Some(description) = &config.description {
            step = step.with_description(description.clone());
        }
        if let Some(timeout_ms) = config.timeout_ms {
            step = step.with_timeout(Duration::from_millis(timeout_ms));
        }
        for (workflow_field, step_field) in &config.input_mapping {
            step = step.map_input(workflow_field.clone(), step_field.clone());
        }
        for (step_field, workflow_field) in &config.output_mapping {
            step = step.map_output(step_field.clone(), workflow_field.clone());
        }

        workflow.add_step(id.as_str(), step).map_err(|e| {
            WorkflowError::Configuration(format!("workflow '{}': {}", settings.name, e))
        })?;
    }

    for id in &step_ids {
        for dep in &file.steps[*id].depends_on {
            workflow.add_dependency(id.as_str(), dep).map_err(|e| {
                WorkflowError::Configuration(format!("workflow '{}': {}", settings.name, e))
            })?;
        }
    }

    debug!(
        workflow = %settings.name,
        steps = workflow.step_count(),
        "built workflow from definition"
    );

    Ok(workflow)
}
