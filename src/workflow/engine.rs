//! Workflow facade.
//!
//! Owns the steps, the dependency graph, and the concurrency width, and
//! drives one execution at a time. A workflow is built incrementally with
//! [`Workflow::add_step`] / [`Workflow::add_dependency`] and is stateless
//! between independent executions.

use crate::observe::{Logger, Monitor, TracingLogger};
use crate::types::{Result, WorkflowError};
use crate::workflow::executor::Executor;
use crate::workflow::graph::DependencyGraph;
use crate::workflow::result::WorkflowResult;
use crate::workflow::step::{FunctionErrorPolicy, Step};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Default number of steps executed within one batch.
pub const DEFAULT_MAX_PARALLEL_STEPS: usize = 4;

/// A DAG of steps with bounded-concurrency batch execution.
pub struct Workflow {
    name: String,
    description: String,
    steps: HashMap<String, Step>,
    /// Insertion order of step ids; the deterministic tie-break for
    /// batching and output aggregation.
    step_order: Vec<String>,
    graph: DependencyGraph,
    max_parallel_steps: usize,
    function_error_policy: FunctionErrorPolicy,
    logger: Arc<dyn Logger>,
    monitor: Option<Arc<dyn Monitor>>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("step_order", &self.step_order)
            .field("max_parallel_steps", &self.max_parallel_steps)
            .field("function_error_policy", &self.function_error_policy)
            .field("has_monitor", &self.monitor.is_some())
            .finish()
    }
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: HashMap::new(),
            step_order: Vec::new(),
            graph: DependencyGraph::new(),
            max_parallel_steps: DEFAULT_MAX_PARALLEL_STEPS,
            function_error_policy: FunctionErrorPolicy::default(),
            logger: Arc::new(TracingLogger),
            monitor: None,
        }
    }

    /// Set the workflow description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the default tracing logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Attach a monitor. The executor brackets the run and each step in
    /// process/timer pairs keyed by name.
    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// The workflow's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The workflow's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register a step under a unique id. Fails if the id is taken.
    pub fn add_step(&mut self, id: impl Into<String>, step: Step) -> Result<()> {
        let id = id.into();
        if self.steps.contains_key(&id) {
            return Err(WorkflowError::Graph(format!(
                "step '{}' already exists",
                id
            )));
        }
        self.graph.register_step(&id);
        self.step_order.push(id.clone());
        self.steps.insert(id, step);
        Ok(())
    }

    /// Declare that `step_id` depends on `depends_on`. Fails on unknown
    /// ids, self-dependencies, and edges that would create a cycle.
    pub fn add_dependency(&mut self, step_id: &str, depends_on: &str) -> Result<()> {
        self.graph.add_dependency(step_id, depends_on)
    }

    /// Replace all of a step's dependencies, validating the whole set
    /// before committing.
    pub fn set_dependencies(&mut self, step_id: &str, depends_on: &[String]) -> Result<()> {
        self.graph.set_dependencies(step_id, depends_on)
    }

    /// Direct dependency ids of a step.
    pub fn dependencies(&self, step_id: &str) -> HashSet<String> {
        self.graph.dependencies(step_id)
    }

    /// Bound the number of steps executed within one batch. Fails if
    /// `width` is zero.
    pub fn set_max_parallel_steps(&mut self, width: usize) -> Result<()> {
        if width < 1 {
            return Err(WorkflowError::Structural(
                "max_parallel_steps must be at least 1".to_string(),
            ));
        }
        self.max_parallel_steps = width;
        Ok(())
    }

    /// The configured concurrency width.
    pub fn max_parallel_steps(&self) -> usize {
        self.max_parallel_steps
    }

    /// Choose how function-step errors are surfaced (see
    /// [`FunctionErrorPolicy`]).
    pub fn set_function_error_policy(&mut self, policy: FunctionErrorPolicy) {
        self.function_error_policy = policy;
    }

    /// Number of registered steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether a step id is registered.
    pub fn has_step(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    /// Registered step ids in insertion order.
    pub fn step_ids(&self) -> &[String] {
        &self.step_order
    }

    /// Look up a registered step.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Execute the workflow against an initial input mapping.
    ///
    /// Ordinary step failures never surface here; they are captured in
    /// the returned [`WorkflowResult`]. A workflow that cannot start at
    /// all (no steps) yields a failed result carrying one synthetic
    /// structural error.
    pub async fn execute(&self, initial_input: Map<String, Value>) -> WorkflowResult {
        if self.steps.is_empty() {
            return WorkflowResult::structural_failure(
                self.name.clone(),
                "workflow has no steps".to_string(),
            );
        }

        let executor = Executor {
            workflow: &self.name,
            steps: &self.steps,
            step_order: &self.step_order,
            graph: &self.graph,
            max_parallel_steps: self.max_parallel_steps,
            function_error_policy: self.function_error_policy,
            logger: Arc::clone(&self.logger),
            monitor: self.monitor.clone(),
        };

        executor.run(initial_input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_step(tag: &str) -> Step {
        let tag = tag.to_string();
        Step::function("noop", move |_, _| {
            let tag = tag.clone();
            async move { Ok(json!({ "tag": tag })) }
        })
    }

    #[test]
    fn test_duplicate_step_id_rejected() {
        let mut workflow = Workflow::new("test");
        workflow.add_step("a", noop_step("first")).unwrap();
        let err = workflow.add_step("a", noop_step("second")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(workflow.step_count(), 1);
    }

    #[test]
    fn test_width_must_be_positive() {
        let mut workflow = Workflow::new("test");
        assert!(workflow.set_max_parallel_steps(0).is_err());
        workflow.set_max_parallel_steps(2).unwrap();
        assert_eq!(workflow.max_parallel_steps(), 2);
    }

    #[test]
    fn test_dependency_validation_goes_through_graph() {
        let mut workflow = Workflow::new("test");
        workflow.add_step("a", noop_step("a")).unwrap();
        workflow.add_step("b", noop_step("b")).unwrap();

        workflow.add_dependency("b", "a").unwrap();
        assert!(workflow.add_dependency("a", "b").is_err());
        assert!(workflow.add_dependency("a", "a").is_err());
        assert!(workflow.add_dependency("a", "ghost").is_err());
        assert!(workflow.dependencies("b").contains("a"));
    }

    #[tokio::test]
    async fn test_empty_workflow_fails_structurally() {
        let workflow = Workflow::new("empty");
        let result = workflow.execute(Map::new()).await;

        assert!(!result.is_successful());
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors().contains_key("workflow"));
    }

    #[tokio::test]
    async fn test_single_step_run() {
        let mut workflow = Workflow::new("single");
        workflow.add_step("only", noop_step("only")).unwrap();

        let result = workflow.execute(Map::new()).await;
        assert!(result.is_successful());
        assert_eq!(result.step_result("only").unwrap()["tag"], json!("only"));
        // Unmapped step output is namespaced under the step id.
        assert_eq!(result.output()["only"]["tag"], json!("only"));
    }

    #[tokio::test]
    async fn test_workflow_is_stateless_between_runs() {
        let mut workflow = Workflow::new("repeat");
        workflow.add_step("a", noop_step("a")).unwrap();

        let first = workflow.execute(Map::new()).await;
        let second = workflow.execute(Map::new()).await;

        assert!(first.is_successful());
        assert!(second.is_successful());
        assert_ne!(first.run_id(), second.run_id());
        assert_eq!(first.output(), second.output());
    }
}
