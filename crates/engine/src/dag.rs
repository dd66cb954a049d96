//! Dependency ordering — shared by component startup and workflow steps.
//!
//! Rules enforced:
//! 1. Node names must be unique.
//! 2. Every dependency must name a node in the same graph.
//! 3. The graph must be acyclic.
//!
//! The order is a depth-first post-order: every node comes after all of its
//! dependencies. Roots are visited in input order and each node's
//! dependencies in the input order of the dependencies, so the result is
//! deterministic for a fixed input.

use std::collections::{HashMap, HashSet};

use crate::models::WorkflowDefinition;
use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Order `nodes` (`(name, dependency names)`) so that dependencies come first.
///
/// `kind` is only used to word error messages ("component", "step").
///
/// # Errors
/// - [`EngineError::Configuration`] on a duplicate name or unknown dependency.
/// - [`EngineError::Cycle`] naming a node on the first back-edge found.
pub fn topological_order<N, D>(nodes: &[(N, Vec<D>)], kind: &str) -> Result<Vec<String>, EngineError>
where
    N: AsRef<str>,
    D: AsRef<str>,
{
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, (name, _)) in nodes.iter().enumerate() {
        if index.insert(name.as_ref(), i).is_some() {
            return Err(EngineError::configuration(format!(
                "duplicate {kind} '{}'",
                name.as_ref()
            )));
        }
    }

    // Adjacency as indices, sorted by input position for a stable walk.
    let mut edges: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
    for (name, deps) in nodes {
        let mut resolved = Vec::with_capacity(deps.len());
        for dep in deps {
            let Some(&j) = index.get(dep.as_ref()) else {
                return Err(EngineError::configuration(format!(
                    "{kind} '{}' depends on unknown {kind} '{}'",
                    name.as_ref(),
                    dep.as_ref()
                )));
            };
            resolved.push(j);
        }
        resolved.sort_unstable();
        resolved.dedup();
        edges.push(resolved);
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order: Vec<String> = Vec::with_capacity(nodes.len());
    // Explicit stack of (node, next dependency cursor); no recursion.
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Visiting;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            match edges[node].get(cursor) {
                Some(&dep) => {
                    frame.1 += 1;
                    match marks[dep] {
                        Mark::Done => {}
                        Mark::Unvisited => {
                            marks[dep] = Mark::Visiting;
                            stack.push((dep, 0));
                        }
                        Mark::Visiting => {
                            return Err(cycle_error(nodes, &stack, dep));
                        }
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    order.push(nodes[node].0.as_ref().to_owned());
                    stack.pop();
                }
            }
        }
    }

    Ok(order)
}

/// Build the cycle error from the DFS stack: the cycle is the stack suffix
/// starting at `back_to`, closed by the back-edge.
fn cycle_error<N, D>(nodes: &[(N, Vec<D>)], stack: &[(usize, usize)], back_to: usize) -> EngineError
where
    N: AsRef<str>,
{
    let start = stack.iter().position(|&(n, _)| n == back_to).unwrap_or(0);
    let mut path: Vec<String> = stack[start..]
        .iter()
        .map(|&(n, _)| nodes[n].0.as_ref().to_owned())
        .collect();
    let node = nodes[back_to].0.as_ref().to_owned();
    path.push(node.clone());
    EngineError::Cycle { node, path }
}

/// Validate a workflow's step graph and return the step ids in execution order.
///
/// # Errors
/// - [`EngineError::Configuration`] for an empty or duplicate step id, a
///   dependency on a missing step, or an unusable timeout.
/// - [`EngineError::Cycle`] if the step graph is not acyclic.
pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(workflow.steps.len());
    for step in &workflow.steps {
        if step.id.is_empty() {
            return Err(EngineError::configuration(format!(
                "workflow '{}' has a step with an empty id",
                workflow.id
            )));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(EngineError::configuration(format!(
                "duplicate step id '{}' in workflow '{}'",
                step.id, workflow.id
            )));
        }
    }

    for step in &workflow.steps {
        for dep in &step.dependencies {
            if !seen.contains(dep.as_str()) {
                return Err(EngineError::configuration(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                )));
            }
        }
        if step.timeout.is_some() && step.timeout_duration().is_none() {
            return Err(EngineError::configuration(format!(
                "step '{}' has an invalid timeout {:?}; expected a positive number of seconds",
                step.id, step.timeout
            )));
        }
    }

    let graph: Vec<(&str, Vec<&str>)> = workflow
        .steps
        .iter()
        .map(|s| {
            (
                s.id.as_str(),
                s.dependencies.iter().map(String::as_str).collect(),
            )
        })
        .collect();

    topological_order(&graph, "step")
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowStep;

    type Graph = Vec<(&'static str, Vec<&'static str>)>;

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn linear_chain_is_sorted() {
        let g: Graph = vec![("c", vec!["b"]), ("b", vec!["a"]), ("a", vec![])];
        let order = topological_order(&g, "component").unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_respects_every_edge() {
        //   a
        //  / \
        // b   c
        //  \ /
        //   d
        let g: Graph = vec![("d", vec!["b", "c"]), ("b", vec!["a"]), ("c", vec!["a"]), ("a", vec![])];
        let order = topological_order(&g, "component").unwrap();

        assert_eq!(order.len(), 4);
        assert_eq!(order.first().unwrap(), "a");
        assert_eq!(order.last().unwrap(), "d");
        for (node, deps) in &g {
            for dep in deps {
                assert!(position(&order, dep) < position(&order, node));
            }
        }
    }

    #[test]
    fn independent_nodes_keep_input_order() {
        let g: Graph = vec![("x", vec![]), ("y", vec![]), ("z", vec![])];
        assert_eq!(topological_order(&g, "component").unwrap(), vec!["x", "y", "z"]);
    }

    #[test]
    fn dependencies_follow_input_order_not_declaration_order() {
        // 'c' lists its deps as [b, a], but 'a' comes first in the input.
        let g: Graph = vec![("c", vec!["b", "a"]), ("a", vec![]), ("b", vec![])];
        assert_eq!(topological_order(&g, "component").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_detected_with_path() {
        let g: Graph = vec![("a", vec!["c"]), ("b", vec!["a"]), ("c", vec!["b"])];
        match topological_order(&g, "component") {
            Err(EngineError::Cycle { node, path }) => {
                assert!(["a", "b", "c"].contains(&node.as_str()));
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g: Graph = vec![("a", vec!["a"])];
        assert!(matches!(
            topological_order(&g, "component"),
            Err(EngineError::Cycle { node, .. }) if node == "a"
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let g: Graph = vec![("a", vec!["ghost"])];
        assert!(matches!(
            topological_order(&g, "component"),
            Err(EngineError::Configuration(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn long_chain_does_not_overflow_the_stack() {
        let names: Vec<String> = (0..50_000).map(|i| format!("n{i}")).collect();
        let g: Vec<(&str, Vec<&str>)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let deps = if i + 1 < names.len() { vec![names[i + 1].as_str()] } else { vec![] };
                (n.as_str(), deps)
            })
            .collect();

        let order = topological_order(&g, "step").unwrap();
        assert_eq!(order.first().map(String::as_str), Some("n49999"));
        assert_eq!(order.last().map(String::as_str), Some("n0"));
    }

    fn workflow(steps: Vec<WorkflowStep>) -> WorkflowDefinition {
        let mut wf = WorkflowDefinition::new("wf", "test");
        wf.steps = steps;
        wf
    }

    #[test]
    fn validate_workflow_orders_steps_regardless_of_list_order() {
        let wf = workflow(vec![
            WorkflowStep::new("c", "svc", "run").depends_on("b"),
            WorkflowStep::new("a", "svc", "run"),
            WorkflowStep::new("b", "svc", "run").depends_on("a"),
        ]);
        assert_eq!(validate_workflow(&wf).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn validate_workflow_rejects_duplicate_ids() {
        let wf = workflow(vec![
            WorkflowStep::new("a", "svc", "run"),
            WorkflowStep::new("a", "svc", "run"),
        ]);
        assert!(matches!(
            validate_workflow(&wf),
            Err(EngineError::Configuration(msg)) if msg.contains("duplicate step id 'a'")
        ));
    }

    #[test]
    fn validate_workflow_rejects_dangling_dependency() {
        let wf = workflow(vec![WorkflowStep::new("a", "svc", "run").depends_on("ghost")]);
        assert!(matches!(
            validate_workflow(&wf),
            Err(EngineError::Configuration(msg)) if msg.contains("unknown step 'ghost'")
        ));
    }

    #[test]
    fn validate_workflow_rejects_bad_timeout() {
        let wf = workflow(vec![WorkflowStep::new("a", "svc", "run").with_timeout(-1.0)]);
        assert!(matches!(validate_workflow(&wf), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn validate_workflow_detects_step_cycle() {
        let wf = workflow(vec![
            WorkflowStep::new("a", "svc", "run").depends_on("b"),
            WorkflowStep::new("b", "svc", "run").depends_on("a"),
        ]);
        assert!(matches!(validate_workflow(&wf), Err(EngineError::Cycle { .. })));
    }

    #[test]
    fn empty_workflow_is_valid() {
        assert!(validate_workflow(&workflow(vec![])).unwrap().is_empty());
    }
}
