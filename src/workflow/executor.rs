//! Scheduler and executor for one workflow run.
//!
//! Execution proceeds in batches: the ready set (steps whose dependencies
//! are all resolved) is drained in insertion order, at most
//! `max_parallel_steps` at a time. A batch is spawned onto the runtime,
//! fully joined, and only then merged into the run state, so batch members
//! are logically concurrent but their outcomes land in deterministic batch
//! order, and no step starts before every dependency is recorded.

use crate::observe::{Logger, Monitor};
use crate::types::{ExecutionRecord, ExecutionStatus, StepError, StepErrorKind};
use crate::workflow::graph::DependencyGraph;
use crate::workflow::result::WorkflowResult;
use crate::workflow::step::{FunctionErrorPolicy, Step};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Outcome of one spawned step: result or classified failure, plus the
/// measured duration.
type StepOutcome = (std::result::Result<Value, (StepErrorKind, String)>, u64);

/// Borrowed view of a workflow, plus the run collaborators.
pub(crate) struct Executor<'a> {
    pub workflow: &'a str,
    pub steps: &'a HashMap<String, Step>,
    pub step_order: &'a [String],
    pub graph: &'a DependencyGraph,
    pub max_parallel_steps: usize,
    pub function_error_policy: FunctionErrorPolicy,
    pub logger: Arc<dyn Logger>,
    pub monitor: Option<Arc<dyn Monitor>>,
}

/// Ephemeral per-run accumulators. Written only from the merge point
/// after each batch joins.
#[derive(Default)]
struct RunState {
    step_results: HashMap<String, Value>,
    step_errors: HashMap<String, StepError>,
    completed: HashSet<String>,
    skipped: HashMap<String, String>,
    log: Vec<ExecutionRecord>,
}

impl RunState {
    fn resolved(&self, step_id: &str) -> bool {
        self.completed.contains(step_id) || self.skipped.contains_key(step_id)
    }
}

impl Executor<'_> {
    pub(crate) async fn run(&self, initial_input: Map<String, Value>) -> WorkflowResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        let process = self
            .monitor
            .as_ref()
            .map(|m| m.begin_process(&format!("workflow:{}", self.workflow)));

        self.logger.info(
            "workflow run started",
            &context(&[
                ("workflow", json!(self.workflow)),
                ("run_id", json!(run_id.to_string())),
                ("steps", json!(self.step_order.len())),
            ]),
        );

        let mut state = RunState::default();

        // Steps with no dependencies form the first ready set; insertion
        // order is the deterministic tie-break throughout.
        let mut ready: Vec<String> = self
            .step_order
            .iter()
            .filter(|id| self.graph.dependencies(id).is_empty())
            .cloned()
            .collect();
        let mut queued: HashSet<String> = ready.iter().cloned().collect();

        while !ready.is_empty() {
            let batch_len = self.max_parallel_steps.min(ready.len());
            let batch: Vec<String> = ready.drain(..batch_len).collect();
            for id in &batch {
                queued.remove(id);
            }

            let handles = self.spawn_batch(&batch, &initial_input, &state);
            self.merge_batch(handles, &mut state).await;

            // Recompute readiness: a step joins the ready set once every
            // dependency is resolved as completed (failed counts: a
            // failed step is resolved, not skipped).
            for id in self.step_order {
                if state.resolved(id) || queued.contains(id) {
                    continue;
                }
                let deps = self.graph.dependencies(id);
                if deps.iter().all(|dep| state.completed.contains(dep)) {
                    ready.push(id.clone());
                    queued.insert(id.clone());
                }
            }
        }

        // Anything never reached had an ancestor skipped, permanently
        // unsatisfying its dependencies.
        for id in self.step_order {
            if !state.resolved(id) {
                self.mark_skipped(&mut state, id, "unreachable".to_string());
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        if let (Some(monitor), Some(handle)) = (self.monitor.as_ref(), process) {
            monitor.end_process(handle);
        }

        let result = WorkflowResult::from_run(
            self.workflow.to_string(),
            run_id,
            started_at,
            duration_ms,
            self.steps,
            self.step_order,
            state.step_results,
            state.step_errors,
            state.skipped,
            state.log,
        );

        self.logger.info(
            "workflow run finished",
            &context(&[
                ("workflow", json!(self.workflow)),
                ("run_id", json!(run_id.to_string())),
                ("success", json!(result.is_successful())),
                ("errors", json!(result.errors().len())),
                ("skipped", json!(result.skipped_steps().len())),
                ("duration_ms", json!(duration_ms)),
            ]),
        );

        result
    }

    /// Spawn every batch member onto the runtime. Each task resolves its
    /// own input, applies its own timeout, and reports a classified
    /// outcome. It never takes locks or touches the run state.
    fn spawn_batch(
        &self,
        batch: &[String],
        initial_input: &Map<String, Value>,
        state: &RunState,
    ) -> Vec<(String, JoinHandle<StepOutcome>)> {
        batch
            .iter()
            .map(|id| {
                let step = self.steps[id].clone();
                let input = step.resolve_input(initial_input);
                let prior = state.step_results.clone();
                let policy = self.function_error_policy;
                let timer = self
                    .monitor
                    .as_ref()
                    .map(|m| (Arc::clone(m), m.start_timer(&format!("step:{}", id))));

                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = match step.timeout() {
                        Some(limit) => {
                            match tokio::time::timeout(
                                limit,
                                step.execute_with_policy(input, prior, policy),
                            )
                            .await
                            {
                                Ok(result) => result
                                    .map_err(|e| (StepErrorKind::Execution, e.to_string())),
                                Err(_) => Err((
                                    StepErrorKind::Timeout,
                                    format!("step timed out after {}ms", limit.as_millis()),
                                )),
                            }
                        }
                        None => step
                            .execute_with_policy(input, prior, policy)
                            .await
                            .map_err(|e| (StepErrorKind::Execution, e.to_string())),
                    };
                    let duration_ms = started.elapsed().as_millis() as u64;
                    if let Some((monitor, handle)) = timer {
                        monitor.stop_timer(handle);
                    }
                    (result, duration_ms)
                });

                (id.clone(), handle)
            })
            .collect()
    }

    /// Wait for the whole batch and merge outcomes in batch order, the
    /// single serialization point for the run accumulators.
    async fn merge_batch(
        &self,
        handles: Vec<(String, JoinHandle<StepOutcome>)>,
        state: &mut RunState,
    ) {
        for (id, handle) in handles {
            let (result, duration_ms) = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => (
                    Err((StepErrorKind::Execution, format!("step task aborted: {}", e))),
                    0,
                ),
            };
            let timestamp = Utc::now();

            match result {
                Ok(output) => {
                    self.logger.debug(
                        "step completed",
                        &context(&[
                            ("step", json!(id)),
                            ("duration_ms", json!(duration_ms)),
                        ]),
                    );
                    state.step_results.insert(id.clone(), output);
                    state.completed.insert(id.clone());
                    state.log.push(ExecutionRecord {
                        step_id: id,
                        status: ExecutionStatus::Completed,
                        timestamp,
                        duration_ms,
                        detail: None,
                    });
                }
                Err((kind, message)) => {
                    let required = self.steps[&id].is_required();
                    self.logger.warn(
                        "step failed",
                        &context(&[
                            ("step", json!(id)),
                            ("required", json!(required)),
                            ("error", json!(message)),
                        ]),
                    );
                    state.step_errors.insert(
                        id.clone(),
                        StepError {
                            step_id: id.clone(),
                            kind,
                            message: message.clone(),
                            timestamp,
                        },
                    );
                    // A failed step is resolved, not skipped.
                    state.completed.insert(id.clone());
                    state.log.push(ExecutionRecord {
                        step_id: id.clone(),
                        status: ExecutionStatus::Failed,
                        timestamp,
                        duration_ms,
                        detail: Some(message),
                    });

                    if required {
                        self.cascade_skip(state, &id);
                    }
                }
            }
        }
    }

    /// Mark every transitive dependent of a failed required step as
    /// skipped, excluding it from all future ready sets.
    fn cascade_skip(&self, state: &mut RunState, failed_id: &str) {
        let dependents = self.graph.dependents_of(failed_id);
        for id in self.step_order {
            if dependents.contains(id) && !state.resolved(id) {
                self.mark_skipped(state, id, format!("depends on failed step {}", failed_id));
            }
        }
    }

    fn mark_skipped(&self, state: &mut RunState, step_id: &str, reason: String) {
        self.logger.warn(
            "step skipped",
            &context(&[("step", json!(step_id)), ("reason", json!(reason))]),
        );
        state.skipped.insert(step_id.to_string(), reason.clone());
        state.log.push(ExecutionRecord {
            step_id: step_id.to_string(),
            status: ExecutionStatus::Skipped,
            timestamp: Utc::now(),
            duration_ms: 0,
            detail: Some(reason),
        });
    }
}

fn context(fields: &[(&str, Value)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
