//! Graph validation and level planning — run once, before any node runs.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs and existing output/input
//!    parameter names on those nodes.
//! 3. Truly duplicate edges (identical source/target/parameter quadruple)
//!    are rejected; genuine fan-in (distinct edges landing on the same
//!    target input) is allowed and resolved at gather-time.
//! 4. The directed graph must be acyclic — Kahn's algorithm, grouped into
//!    levels (maximal antichains) rather than a single flat order, so the
//!    scheduler can dispatch a level's nodes concurrently.

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::models::Workflow;

/// A maximal set of node ids with no intra-set dependencies — executable in
/// parallel.
pub type ExecutionLevel = Vec<String>;

/// Validate the workflow's DAG and return execution levels plus the flat
/// concatenated order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] / [`EngineError::UnknownParameter`]
///   if an edge references a missing node or parameter name.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn plan(workflow: &Workflow) -> Result<(Vec<ExecutionLevel>, Vec<String>), EngineError> {
    // -----------------------------------------------------------------------
    // 1. Node IDs unique.
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints and parameter names.
    // -----------------------------------------------------------------------
    for edge in &workflow.edges {
        let source = workflow.node(&edge.source).ok_or_else(|| EngineError::UnknownNodeReference {
            node_id: edge.source.clone(),
            side: "source",
        })?;
        let target = workflow.node(&edge.target).ok_or_else(|| EngineError::UnknownNodeReference {
            node_id: edge.target.clone(),
            side: "target",
        })?;

        if source.output(&edge.source_output).is_none() {
            return Err(EngineError::UnknownParameter {
                node_id: edge.source.clone(),
                param: edge.source_output.clone(),
                side: "source",
            });
        }
        if target.input(&edge.target_input).is_none() {
            return Err(EngineError::UnknownParameter {
                node_id: edge.target.clone(),
                param: edge.target_input.clone(),
                side: "target",
            });
        }
    }

    let mut seen_edges: HashSet<(&str, &str, &str, &str)> = HashSet::new();
    for edge in &workflow.edges {
        let key = (
            edge.source.as_str(),
            edge.source_output.as_str(),
            edge.target.as_str(),
            edge.target_input.as_str(),
        );
        if !seen_edges.insert(key) {
            return Err(EngineError::DuplicateTargetBinding {
                target: edge.target.clone(),
                target_input: edge.target_input.clone(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Kahn's algorithm, grouped into levels.
    // -----------------------------------------------------------------------
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &workflow.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for edge in &workflow.edges {
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let declared_order: Vec<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    let mut levels: Vec<ExecutionLevel> = Vec::new();
    let mut ordered: Vec<String> = Vec::with_capacity(workflow.nodes.len());
    let mut remaining_in_degree = in_degree.clone();

    loop {
        // Next level: every node currently at in-degree 0 that hasn't been
        // emitted yet, in workflow-declared order (determinism).
        let current_level: ExecutionLevel = declared_order
            .iter()
            .filter(|id| remaining_in_degree.get(*id) == Some(&0))
            .map(|id| id.to_string())
            .collect();

        if current_level.is_empty() {
            break;
        }

        for id in &current_level {
            remaining_in_degree.remove(id.as_str());
        }

        for id in &current_level {
            if let Some(neighbours) = adjacency.get(id.as_str()) {
                for &neighbour in neighbours {
                    if let Some(deg) = remaining_in_degree.get_mut(neighbour) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }

        ordered.extend(current_level.iter().cloned());
        levels.push(current_level);
    }

    if ordered.len() != workflow.nodes.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok((levels, ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, NodeSpec, Trigger};
    use nodes::value::{NodeRuntimeValues, ParameterSpec, SemanticType};

    fn param(name: &str) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            ty: SemanticType::Json,
            required: false,
            default: None,
            hidden: false,
        }
    }

    fn make_node(id: &str, outputs: &[&str], inputs: &[&str]) -> NodeSpec {
        NodeSpec {
            id: id.to_string(),
            node_type: "mock".into(),
            inputs: inputs.iter().map(|n| param(n)).collect(),
            outputs: outputs.iter().map(|n| param(n)).collect(),
            literals: NodeRuntimeValues::new(),
        }
    }

    fn edge(source: &str, source_output: &str, target: &str, target_input: &str) -> Edge {
        Edge {
            source: source.into(),
            source_output: source_output.into(),
            target: target.into(),
            target_input: target_input.into(),
        }
    }

    fn workflow(nodes: Vec<NodeSpec>, edges: Vec<Edge>) -> Workflow {
        Workflow::new("test", "test", Trigger::Manual, nodes, edges)
    }

    #[test]
    fn linear_dag_produces_one_node_per_level() {
        let wf = workflow(
            vec![
                make_node("a", &["out"], &[]),
                make_node("b", &["out"], &["in"]),
                make_node("c", &["out"], &["in"]),
            ],
            vec![edge("a", "out", "b", "in"), edge("b", "out", "c", "in")],
        );

        let (levels, ordered) = plan(&wf).expect("should be valid");
        assert_eq!(levels, vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_dag_groups_independent_nodes_into_one_level() {
        let wf = workflow(
            vec![
                make_node("a", &["out"], &[]),
                make_node("b", &["out"], &["in"]),
                make_node("c", &["out"], &["in"]),
                make_node("d", &["out"], &["in1", "in2"]),
            ],
            vec![
                edge("a", "out", "b", "in"),
                edge("a", "out", "c", "in"),
                edge("b", "out", "d", "in1"),
                edge("c", "out", "d", "in2"),
            ],
        );

        let (levels, _) = plan(&wf).expect("should be valid");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec!["a"]);
        assert_eq!(levels[1], vec!["b", "c"]);
        assert_eq!(levels[2], vec!["d"]);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let wf = workflow(vec![make_node("a", &[], &[]), make_node("a", &[], &[])], vec![]);
        assert!(matches!(plan(&wf), Err(EngineError::DuplicateNodeId(id)) if id == "a"));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let wf = workflow(vec![make_node("a", &["out"], &[])], vec![edge("a", "out", "ghost", "in")]);
        assert!(matches!(
            plan(&wf),
            Err(EngineError::UnknownNodeReference { node_id, .. }) if node_id == "ghost"
        ));
    }

    #[test]
    fn edge_referencing_missing_parameter_is_rejected() {
        let wf = workflow(
            vec![make_node("a", &["out"], &[]), make_node("b", &[], &["in"])],
            vec![edge("a", "missing", "b", "in")],
        );
        assert!(matches!(plan(&wf), Err(EngineError::UnknownParameter { .. })));
    }

    #[test]
    fn cycle_is_detected() {
        let wf = workflow(
            vec![
                make_node("a", &["out"], &["in"]),
                make_node("b", &["out"], &["in"]),
                make_node("c", &["out"], &["in"]),
            ],
            vec![
                edge("a", "out", "b", "in"),
                edge("b", "out", "c", "in"),
                edge("c", "out", "a", "in"),
            ],
        );
        assert!(matches!(plan(&wf), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn single_node_no_edges_is_valid() {
        let wf = workflow(vec![make_node("solo", &[], &[])], vec![]);
        let (levels, ordered) = plan(&wf).expect("single node should be valid");
        assert_eq!(levels, vec![vec!["solo"]]);
        assert_eq!(ordered, vec!["solo"]);
    }

    #[test]
    fn empty_workflow_has_no_levels() {
        let wf = workflow(vec![], vec![]);
        let (levels, ordered) = plan(&wf).expect("empty workflow is valid");
        assert!(levels.is_empty());
        assert!(ordered.is_empty());
    }

    #[test]
    fn fan_in_edges_onto_the_same_input_are_allowed() {
        let wf = workflow(
            vec![
                make_node("p1", &["out"], &[]),
                make_node("p2", &["out"], &[]),
                make_node("agg", &["out"], &["items"]),
            ],
            vec![edge("p1", "out", "agg", "items"), edge("p2", "out", "agg", "items")],
        );
        let (levels, _) = plan(&wf).expect("fan-in should be valid");
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1], vec!["agg"]);
    }
}
