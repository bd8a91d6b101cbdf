//! Immutable result of one workflow execution.

use crate::types::{ExecutionRecord, ExecutionStatus, StepError, StepErrorKind};
use crate::workflow::step::Step;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Snapshot of a finished run: per-step outputs, errors, skip reasons, the
/// ordered execution log, and the aggregated workflow-level output.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    workflow: String,
    run_id: Uuid,
    success: bool,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    output: Map<String, Value>,
    step_results: HashMap<String, Value>,
    step_errors: HashMap<String, StepError>,
    skipped_steps: HashMap<String, String>,
    execution_log: Vec<ExecutionRecord>,
}

impl WorkflowResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_run(
        workflow: String,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        steps: &HashMap<String, Step>,
        step_order: &[String],
        step_results: HashMap<String, Value>,
        step_errors: HashMap<String, StepError>,
        skipped_steps: HashMap<String, String>,
        execution_log: Vec<ExecutionRecord>,
    ) -> Self {
        // Success means every required step ran to completion: no required
        // step failed or was skipped. Optional steps never affect it.
        let success = step_order.iter().all(|id| {
            let required = steps.get(id).map(Step::is_required).unwrap_or(false);
            !required || (!step_errors.contains_key(id) && !skipped_steps.contains_key(id))
        });

        let output = aggregate_output(steps, step_order, &step_results, &step_errors);

        Self {
            workflow,
            run_id,
            success,
            started_at,
            duration_ms,
            output,
            step_results,
            step_errors,
            skipped_steps,
            execution_log,
        }
    }

    /// Build the failed result for a workflow that could not start. The
    /// synthetic error is recorded under the reserved key `"workflow"`.
    pub(crate) fn structural_failure(workflow: String, message: String) -> Self {
        let timestamp = Utc::now();
        let mut step_errors = HashMap::new();
        step_errors.insert(
            "workflow".to_string(),
            StepError {
                step_id: "workflow".to_string(),
                kind: StepErrorKind::Structural,
                message: message.clone(),
                timestamp,
            },
        );

        Self {
            workflow,
            run_id: Uuid::new_v4(),
            success: false,
            started_at: timestamp,
            duration_ms: 0,
            output: Map::new(),
            step_results: HashMap::new(),
            step_errors,
            skipped_steps: HashMap::new(),
            execution_log: vec![ExecutionRecord {
                step_id: "workflow".to_string(),
                status: ExecutionStatus::Failed,
                timestamp,
                duration_ms: 0,
                detail: Some(message),
            }],
        }
    }

    /// The owning workflow's name.
    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    /// Unique id of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Whether every required step completed without error.
    pub fn is_successful(&self) -> bool {
        self.success
    }

    /// When the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Total wall-clock time of the run.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// The aggregated workflow-level output.
    pub fn output(&self) -> &Map<String, Value> {
        &self.output
    }

    /// The raw result of a single step, if it completed.
    pub fn step_result(&self, step_id: &str) -> Option<&Value> {
        self.step_results.get(step_id)
    }

    /// All raw step results.
    pub fn step_results(&self) -> &HashMap<String, Value> {
        &self.step_results
    }

    /// Structured errors keyed by step id.
    pub fn errors(&self) -> &HashMap<String, StepError> {
        &self.step_errors
    }

    /// Skip reasons keyed by step id.
    pub fn skipped_steps(&self) -> &HashMap<String, String> {
        &self.skipped_steps
    }

    /// The ordered execution log.
    pub fn execution_log(&self) -> &[ExecutionRecord] {
        &self.execution_log
    }
}

/// Assemble the workflow-level output from completed steps, in step
/// insertion order.
///
/// A step with a non-empty output mapping contributes each mapped
/// `(step field -> workflow field)` pair that is present in its result. A
/// step with an empty mapping contributes its entire result nested under
/// its own id, namespacing that callers rely on to avoid field collisions.
fn aggregate_output(
    steps: &HashMap<String, Step>,
    step_order: &[String],
    step_results: &HashMap<String, Value>,
    step_errors: &HashMap<String, StepError>,
) -> Map<String, Value> {
    let mut output = Map::new();

    for step_id in step_order {
        if step_errors.contains_key(step_id) {
            continue;
        }
        let (Some(step), Some(result)) = (steps.get(step_id), step_results.get(step_id)) else {
            continue;
        };

        let mapping = step.output_mapping();
        if mapping.is_empty() {
            output.insert(step_id.clone(), result.clone());
            continue;
        }

        if let Value::Object(fields) = result {
            for (step_field, workflow_field) in mapping {
                if let Some(value) = fields.get(step_field) {
                    output.insert(workflow_field.clone(), value.clone());
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step_with_mapping(pairs: &[(&str, &str)]) -> Step {
        let mut step = Step::function("s", |_, _| async { Ok(json!({})) });
        for (from, to) in pairs {
            step = step.map_output(*from, *to);
        }
        step
    }

    #[test]
    fn test_mapped_fields_are_copied() {
        let mut steps = HashMap::new();
        steps.insert(
            "a".to_string(),
            step_with_mapping(&[("content", "answer"), ("missing", "never")]),
        );
        let mut results = HashMap::new();
        results.insert("a".to_string(), json!({"content": "42", "extra": 1}));

        let output = aggregate_output(
            &steps,
            &["a".to_string()],
            &results,
            &HashMap::new(),
        );
        assert_eq!(output.get("answer"), Some(&json!("42")));
        // Only pairs present in the step result are copied.
        assert!(!output.contains_key("never"));
        // Unmapped step fields are not spilled into the workflow output.
        assert!(!output.contains_key("extra"));
    }

    #[test]
    fn test_unmapped_step_is_namespaced_by_id() {
        let mut steps = HashMap::new();
        steps.insert("a".to_string(), step_with_mapping(&[]));
        let mut results = HashMap::new();
        results.insert("a".to_string(), json!({"content": "42"}));

        let output = aggregate_output(
            &steps,
            &["a".to_string()],
            &results,
            &HashMap::new(),
        );
        assert_eq!(output.get("a"), Some(&json!({"content": "42"})));
    }

    #[test]
    fn test_failed_steps_do_not_aggregate() {
        let mut steps = HashMap::new();
        steps.insert("a".to_string(), step_with_mapping(&[]));
        let mut results = HashMap::new();
        results.insert("a".to_string(), json!({"content": "partial"}));
        let mut errors = HashMap::new();
        errors.insert(
            "a".to_string(),
            StepError {
                step_id: "a".to_string(),
                kind: StepErrorKind::Execution,
                message: "failed".to_string(),
                timestamp: Utc::now(),
            },
        );

        let output = aggregate_output(&steps, &["a".to_string()], &results, &errors);
        assert!(output.is_empty());
    }

    #[test]
    fn test_structural_failure_shape() {
        let result =
            WorkflowResult::structural_failure("empty".to_string(), "workflow has no steps".into());
        assert!(!result.is_successful());
        assert_eq!(result.errors().len(), 1);
        let err = &result.errors()["workflow"];
        assert_eq!(err.kind, StepErrorKind::Structural);
        assert_eq!(result.execution_log().len(), 1);
    }
}
