//! Dependency graph with cycle rejection.
//!
//! Steps are registered by id and connected by directed edges where
//! `step -> dep` means "step depends on dep". The graph is an adjacency
//! map keyed by id (ids are the pointers, the map is the arena), so there
//! are no ownership cycles to manage. Every insertion is validated against
//! the edges that exist before it: unknown ids, self-edges, and edges that
//! would close a cycle are rejected and leave the graph unchanged.

use crate::types::{Result, WorkflowError};
use std::collections::{HashMap, HashSet, VecDeque};

/// Per-workflow map of step id to the set of ids it depends on.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependencies: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step id with no dependencies. Idempotent.
    pub fn register_step(&mut self, step_id: &str) {
        self.dependencies.entry(step_id.to_string()).or_default();
    }

    /// Whether a step id is registered.
    pub fn contains(&self, step_id: &str) -> bool {
        self.dependencies.contains_key(step_id)
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether the graph has no registered steps.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Add a single dependency edge: `step_id` depends on `depends_on`.
    ///
    /// Fails if either id is unknown, if the edge is a self-dependency, or
    /// if the edge would create a cycle. On failure the graph is unchanged.
    pub fn add_dependency(&mut self, step_id: &str, depends_on: &str) -> Result<()> {
        self.validate_edge(step_id, depends_on)?;
        self.dependencies
            .get_mut(step_id)
            .ok_or_else(|| WorkflowError::Graph(format!("unknown step '{}'", step_id)))?
            .insert(depends_on.to_string());
        Ok(())
    }

    /// Replace all of a step's dependencies with the given set.
    ///
    /// The full replacement set is validated before any mutation, so a
    /// failure never leaves the graph partially modified.
    pub fn set_dependencies(&mut self, step_id: &str, depends_on: &[String]) -> Result<()> {
        for dep in depends_on {
            self.validate_edge(step_id, dep)?;
        }
        self.dependencies.insert(
            step_id.to_string(),
            depends_on.iter().cloned().collect::<HashSet<_>>(),
        );
        Ok(())
    }

    /// Direct dependency ids of a step. Empty for unknown ids.
    pub fn dependencies(&self, step_id: &str) -> HashSet<String> {
        self.dependencies.get(step_id).cloned().unwrap_or_default()
    }

    /// Every step that transitively depends on `step_id`, directly or
    /// through intermediate steps. Used for the skip cascade.
    pub fn dependents_of(&self, step_id: &str) -> HashSet<String> {
        let mut dependents = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(step_id);

        while let Some(current) = queue.pop_front() {
            for (candidate, deps) in &self.dependencies {
                if deps.contains(current) && dependents.insert(candidate.clone()) {
                    queue.push_back(candidate);
                }
            }
        }

        dependents
    }

    fn validate_edge(&self, step_id: &str, depends_on: &str) -> Result<()> {
        if !self.contains(step_id) {
            return Err(WorkflowError::Graph(format!("unknown step '{}'", step_id)));
        }
        if !self.contains(depends_on) {
            return Err(WorkflowError::Graph(format!(
                "unknown dependency '{}'",
                depends_on
            )));
        }
        if step_id == depends_on {
            return Err(WorkflowError::Graph(format!(
                "step '{}' cannot depend on itself",
                step_id
            )));
        }
        // The edge closes a cycle iff the dependency already (transitively)
        // depends on the step, using the edges present before insertion.
        if self.depends_transitively(depends_on, step_id) {
            return Err(WorkflowError::Graph(format!(
                "dependency would create a cycle: '{}' -> '{}'",
                step_id, depends_on
            )));
        }
        Ok(())
    }

    /// Whether `from` transitively depends on `target`.
    fn depends_transitively(&self, from: &str, target: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if let Some(deps) = self.dependencies.get(current) {
                for dep in deps {
                    if visited.insert(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(ids: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for id in ids {
            graph.register_step(id);
        }
        graph
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_dependency("b", "a").unwrap();
        assert!(graph.dependencies("b").contains("a"));
        assert!(graph.dependencies("a").is_empty());
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let mut graph = graph_with(&["a"]);
        assert!(graph.add_dependency("a", "missing").is_err());
        assert!(graph.add_dependency("missing", "a").is_err());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut graph = graph_with(&["a"]);
        let err = graph.add_dependency("a", "a").unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn test_direct_cycle_rejected() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_dependency("b", "a").unwrap();
        let err = graph.add_dependency("a", "b").unwrap_err();
        assert!(err.to_string().contains("cycle"));
        // The failed insertion left the graph unchanged.
        assert!(graph.dependencies("a").is_empty());
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph.add_dependency("b", "a").unwrap();
        graph.add_dependency("c", "b").unwrap();
        assert!(graph.add_dependency("a", "c").is_err());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = graph_with(&["a", "b", "c", "d"]);
        graph.add_dependency("b", "a").unwrap();
        graph.add_dependency("c", "a").unwrap();
        graph.add_dependency("d", "b").unwrap();
        graph.add_dependency("d", "c").unwrap();
        assert_eq!(graph.dependencies("d").len(), 2);
    }

    #[test]
    fn test_set_dependencies_validates_before_commit() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph.add_dependency("b", "a").unwrap();

        // One bad entry fails the whole replacement and keeps the old set.
        let result = graph.set_dependencies("a", &["c".to_string(), "b".to_string()]);
        assert!(result.is_err());
        assert!(graph.dependencies("a").is_empty());

        graph
            .set_dependencies("c", &["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(graph.dependencies("c").len(), 2);
    }

    #[test]
    fn test_dependents_of_is_transitive() {
        let mut graph = graph_with(&["a", "b", "c", "d"]);
        graph.add_dependency("b", "a").unwrap();
        graph.add_dependency("c", "b").unwrap();

        let dependents = graph.dependents_of("a");
        assert_eq!(dependents.len(), 2);
        assert!(dependents.contains("b"));
        assert!(dependents.contains("c"));
        assert!(!dependents.contains("d"));
    }
}
