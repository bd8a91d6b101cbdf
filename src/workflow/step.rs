//! Step abstraction: the polymorphic unit of work.
//!
//! A step is shared metadata (required flag, timeout, field mappings)
//! around a closed set of work variants. Keeping the variants a closed
//! enum, rather than an open trait, lets the scheduler match on them
//! exhaustively.

use crate::agents::Agent;
use crate::types::{Result, WorkflowError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stored function-step body: `(input, prior step outputs) -> result`.
pub type StepFn = Arc<
    dyn Fn(Map<String, Value>, HashMap<String, Value>) -> BoxFuture<'static, Result<Value>>
        + Send
        + Sync,
>;

/// How a function step's error is surfaced to the scheduler.
///
/// The agent variant always fails "loudly" (its error reaches the
/// scheduler and is governed by the step's required flag). Historically
/// the function variant instead swallowed errors into an error-shaped
/// output; this policy makes that behavior explicit and switchable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionErrorPolicy {
    /// Convert the error into an `{error, error_kind, execution_time_ms}`
    /// output. The step counts as completed; no skip cascade.
    #[default]
    Capture,
    /// Surface the error as a step execution failure, exactly like an
    /// agent step.
    Propagate,
}

/// The closed set of work variants a step can wrap.
#[derive(Clone)]
pub enum StepKind {
    /// Delegates to an external agent. The task template is interpolated
    /// against the step input before the call.
    Agent {
        /// The agent collaborator to run.
        agent: Arc<dyn Agent>,
        /// Task template; `{field}` tokens are replaced with matching
        /// scalar input values.
        task: String,
    },
    /// Wraps a caller-supplied async function.
    Function {
        /// The function body.
        func: StepFn,
    },
}

impl fmt::Debug for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Agent { agent, task } => f
                .debug_struct("Agent")
                .field("agent", &agent.name())
                .field("task", task)
                .finish(),
            StepKind::Function { .. } => f.debug_struct("Function").finish_non_exhaustive(),
        }
    }
}

/// A single unit of work in a workflow.
///
/// Identity (the step id) lives in the owning workflow's map; the step
/// itself carries name, description, failure semantics, timeout, and the
/// input/output field mappings.
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    description: String,
    required: bool,
    timeout: Option<Duration>,
    /// workflow field -> step field
    input_mapping: HashMap<String, String>,
    /// step field -> workflow field
    output_mapping: HashMap<String, String>,
    kind: StepKind,
}

impl Step {
    /// Create a delegated-task step wrapping an agent.
    pub fn agent(name: impl Into<String>, agent: Arc<dyn Agent>, task: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            StepKind::Agent {
                agent,
                task: task.into(),
            },
        )
    }

    /// Create a pure-function step from an async closure.
    pub fn function<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Map<String, Value>, HashMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let func: StepFn = Arc::new(move |input, prior| Box::pin(func(input, prior)));
        Self::with_kind(name, StepKind::Function { func })
    }

    fn with_kind(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: true,
            timeout: None,
            input_mapping: HashMap::new(),
            output_mapping: HashMap::new(),
            kind,
        }
    }

    /// Set the step description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the step optional: its failure never cascades to dependents
    /// and never fails the run.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the required flag explicitly.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Bound this step's execution time. A timeout surfaces as a failure
    /// of this step alone.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rename a workflow input field into a step input field.
    pub fn map_input(mut self, workflow_field: impl Into<String>, step_field: impl Into<String>) -> Self {
        self.input_mapping
            .insert(workflow_field.into(), step_field.into());
        self
    }

    /// Declare that a step result field becomes a workflow output field.
    pub fn map_output(mut self, step_field: impl Into<String>, workflow_field: impl Into<String>) -> Self {
        self.output_mapping
            .insert(step_field.into(), workflow_field.into());
        self
    }

    /// The step's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The step's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether a failure of this step cascades to its dependents.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The configured execution bound, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The workflow-field -> step-field input mapping.
    pub fn input_mapping(&self) -> &HashMap<String, String> {
        &self.input_mapping
    }

    /// The step-field -> workflow-field output mapping.
    pub fn output_mapping(&self) -> &HashMap<String, String> {
        &self.output_mapping
    }

    /// The wrapped work variant.
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// Build this step's input from the workflow input: mapped fields are
    /// renamed, unmapped fields pass through unchanged.
    pub(crate) fn resolve_input(&self, workflow_input: &Map<String, Value>) -> Map<String, Value> {
        let mut resolved = Map::new();
        for (field, value) in workflow_input {
            match self.input_mapping.get(field) {
                Some(step_field) => resolved.insert(step_field.clone(), value.clone()),
                None => resolved.insert(field.clone(), value.clone()),
            };
        }
        resolved
    }

    /// Execute the step with the default (capturing) function-error policy.
    pub async fn execute(
        &self,
        input: Map<String, Value>,
        prior_outputs: HashMap<String, Value>,
    ) -> Result<Value> {
        self.execute_with_policy(input, prior_outputs, FunctionErrorPolicy::Capture)
            .await
    }

    pub(crate) async fn execute_with_policy(
        &self,
        input: Map<String, Value>,
        prior_outputs: HashMap<String, Value>,
        policy: FunctionErrorPolicy,
    ) -> Result<Value> {
        match &self.kind {
            StepKind::Agent { agent, task } => {
                let rendered = interpolate(task, &input);
                let response = agent.run(&rendered, &input).await.map_err(|e| {
                    WorkflowError::StepExecution(format!(
                        "agent '{}' failed in step '{}': {}",
                        agent.name(),
                        self.name,
                        e
                    ))
                })?;
                Ok(json!({
                    "content": response.content,
                    "metadata": Value::Object(response.metadata),
                    "execution_time_ms": response.execution_time_ms,
                }))
            }
            StepKind::Function { func } => {
                let started = Instant::now();
                match func(input, prior_outputs).await {
                    Ok(value) => {
                        let mut object = match value {
                            Value::Object(map) => map,
                            other => {
                                let mut map = Map::new();
                                map.insert("result".to_string(), other);
                                map
                            }
                        };
                        object.insert(
                            "execution_time_ms".to_string(),
                            json!(started.elapsed().as_millis() as u64),
                        );
                        Ok(Value::Object(object))
                    }
                    Err(err) => match policy {
                        FunctionErrorPolicy::Capture => Ok(json!({
                            "error": err.to_string(),
                            "error_kind": "function",
                            "execution_time_ms": started.elapsed().as_millis() as u64,
                        })),
                        FunctionErrorPolicy::Propagate => Err(WorkflowError::StepExecution(
                            format!("function step '{}' failed: {}", self.name, err),
                        )),
                    },
                }
            }
        }
    }
}

/// Replace every `{field}` token with the matching scalar input value.
/// Non-scalar values (arrays, objects, null) are left uninterpolated.
fn interpolate(template: &str, input: &Map<String, Value>) -> String {
    let mut rendered = template.to_string();
    for (field, value) in input {
        let token = format!("{{{}}}", field);
        if !rendered.contains(&token) {
            continue;
        }
        let replacement = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        rendered = rendered.replace(&token, &replacement);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentResponse;
    use async_trait::async_trait;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        async fn run(&self, task: &str, _context: &Map<String, Value>) -> Result<AgentResponse> {
            Ok(AgentResponse::new(format!("echo: {}", task), 3))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_interpolate_scalars_only() {
        let input = object(json!({
            "topic": "rust",
            "count": 3,
            "verbose": true,
            "tags": ["a", "b"],
        }));

        let rendered = interpolate("{topic} x{count} verbose={verbose} tags={tags}", &input);
        assert_eq!(rendered, "rust x3 verbose=true tags={tags}");
    }

    #[test]
    fn test_resolve_input_renames_and_passes_through() {
        let step = Step::function("noop", |_, _| async { Ok(json!({})) })
            .map_input("query", "question");

        let resolved = step.resolve_input(&object(json!({"query": "q", "extra": 1})));
        assert_eq!(resolved.get("question"), Some(&json!("q")));
        assert_eq!(resolved.get("extra"), Some(&json!(1)));
        assert!(!resolved.contains_key("query"));
    }

    #[tokio::test]
    async fn test_agent_step_output_shape() {
        let step = Step::agent("ask", Arc::new(EchoAgent), "say {word}");
        let output = step
            .execute(object(json!({"word": "hi"})), HashMap::new())
            .await
            .unwrap();

        assert_eq!(output["content"], json!("echo: say hi"));
        assert_eq!(output["execution_time_ms"], json!(3));
        assert!(output["metadata"].is_object());
    }

    #[tokio::test]
    async fn test_function_step_wraps_bare_result() {
        let step = Step::function("double", |input, _| async move {
            let n = input.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(n * 2))
        });

        let output = step
            .execute(object(json!({"n": 21})), HashMap::new())
            .await
            .unwrap();
        assert_eq!(output["result"], json!(42));
        assert!(output.get("execution_time_ms").is_some());
    }

    #[tokio::test]
    async fn test_function_step_captures_error_by_default() {
        let step = Step::function("boom", |_, _| async {
            Err(WorkflowError::StepExecution("bad input".to_string()))
        });

        let output = step.execute(Map::new(), HashMap::new()).await.unwrap();
        assert!(output["error"].as_str().unwrap().contains("bad input"));
        assert_eq!(output["error_kind"], json!("function"));
    }

    #[tokio::test]
    async fn test_function_step_propagates_under_policy() {
        let step = Step::function("boom", |_, _| async {
            Err(WorkflowError::StepExecution("bad input".to_string()))
        });

        let result = step
            .execute_with_policy(Map::new(), HashMap::new(), FunctionErrorPolicy::Propagate)
            .await;
        assert!(matches!(result, Err(WorkflowError::StepExecution(_))));
    }

    #[test]
    fn test_step_defaults() {
        let step = Step::function("s", |_, _| async { Ok(json!({})) });
        assert!(step.is_required());
        assert!(step.timeout().is_none());
        assert!(step.input_mapping().is_empty());
        assert!(step.output_mapping().is_empty());
    }
}
