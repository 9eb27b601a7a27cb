//! Workflow graph representation, validation and execution ordering.
//!
//! A workflow is a directed acyclic graph of [`NodeDef`]s connected by
//! [`EdgeDef`]s between typed ports. The graph is always replaced as a
//! whole (full nodes+edges swap), so validation runs over the complete
//! graph at save time; the runner re-runs the topological sort defensively
//! before executing.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::nodes::{self, NodeKind};
use crate::ports;

// ---------------------------------------------------------------------------
// Graph data
// ---------------------------------------------------------------------------

/// Canvas position of a node. Display-only; never interpreted by the
/// engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One node of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    /// Client-assigned identifier, unique within the workflow.
    pub id: String,
    pub kind: NodeKind,
    /// Kind-specific configuration, validated against the kind's schema.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub position: Position,
}

/// A directed connection from an output port to an input port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a complete workflow graph for saving.
///
/// Checks, in order: node id uniqueness, per-node config schemas, edge
/// endpoints and ports, port-type compatibility, and acyclicity.
pub fn validate_graph(node_defs: &[NodeDef], edges: &[EdgeDef]) -> Result<(), CoreError> {
    let mut by_id: HashMap<&str, &NodeDef> = HashMap::with_capacity(node_defs.len());
    for node in node_defs {
        if node.id.trim().is_empty() {
            return Err(CoreError::Validation("Node id must not be empty".into()));
        }
        if by_id.insert(node.id.as_str(), node).is_some() {
            return Err(CoreError::Validation(format!(
                "Duplicate node id \"{}\"",
                node.id
            )));
        }
        nodes::validate_config(node.kind, &node.config)?;
    }

    for edge in edges {
        let source = by_id.get(edge.source.as_str()).ok_or_else(|| {
            CoreError::Validation(format!("Edge source node \"{}\" does not exist", edge.source))
        })?;
        let target = by_id.get(edge.target.as_str()).ok_or_else(|| {
            CoreError::Validation(format!("Edge target node \"{}\" does not exist", edge.target))
        })?;

        let out_port = source
            .kind
            .output_ports()
            .iter()
            .find(|p| p.name == edge.source_port)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Node \"{}\" ({}) has no output port \"{}\"",
                    edge.source,
                    source.kind.as_str(),
                    edge.source_port
                ))
            })?;
        let in_port = target
            .kind
            .input_ports()
            .iter()
            .find(|p| p.name == edge.target_port)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Node \"{}\" ({}) has no input port \"{}\"",
                    edge.target,
                    target.kind.as_str(),
                    edge.target_port
                ))
            })?;

        if !ports::compatible(out_port.ty, in_port.ty) {
            return Err(CoreError::PortIncompatibility(format!(
                "\"{}\".{} ({}) cannot feed \"{}\".{} ({})",
                edge.source,
                edge.source_port,
                out_port.ty.as_str(),
                edge.target,
                edge.target_port,
                in_port.ty.as_str()
            )));
        }
    }

    // Required inputs must be wired.
    for node in node_defs {
        for port in node.kind.input_ports().iter().filter(|p| p.required) {
            let fed = edges
                .iter()
                .any(|e| e.target == node.id && e.target_port == port.name);
            if !fed {
                return Err(CoreError::Validation(format!(
                    "Node \"{}\" ({}) requires an edge into input \"{}\"",
                    node.id,
                    node.kind.as_str(),
                    port.name
                )));
            }
        }
    }

    execution_order(node_defs, edges).map(|_| ())
}

// ---------------------------------------------------------------------------
// Topological sort
// ---------------------------------------------------------------------------

/// Compute the execution order of a graph using Kahn's algorithm.
///
/// The order is deterministic: among ready nodes, declaration order wins.
/// If the sort cannot place every node the graph contains a cycle and a
/// [`CoreError::Cycle`] naming the unplaced nodes is returned.
pub fn execution_order<'a>(
    node_defs: &'a [NodeDef],
    edges: &[EdgeDef],
) -> Result<Vec<&'a str>, CoreError> {
    let index: HashMap<&str, usize> = node_defs
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; node_defs.len()];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_defs.len()];

    for edge in edges {
        let (Some(&from), Some(&to)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) else {
            return Err(CoreError::Validation(format!(
                "Edge references unknown node ({} -> {})",
                edge.source, edge.target
            )));
        };
        adjacency[from].push(to);
        in_degree[to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..node_defs.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(node_defs.len());

    while let Some(i) = queue.pop_front() {
        order.push(node_defs[i].id.as_str());
        for &next in &adjacency[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != node_defs.len() {
        let stuck: Vec<&str> = node_defs
            .iter()
            .filter(|n| !order.contains(&n.id.as_str()))
            .map(|n| n.id.as_str())
            .collect();
        return Err(CoreError::Cycle(format!(
            "nodes not reachable in topological order: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

/// Edges feeding into `node_id`, in declaration order.
pub fn incoming_edges<'a>(node_id: &str, edges: &'a [EdgeDef]) -> Vec<&'a EdgeDef> {
    edges.iter().filter(|e| e.target == node_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn node(id: &str, kind: NodeKind, config: Value) -> NodeDef {
        NodeDef {
            id: id.into(),
            kind,
            config,
            position: Position::default(),
        }
    }

    fn edge(source: &str, source_port: &str, target: &str, target_port: &str) -> EdgeDef {
        EdgeDef {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }

    /// A valid prompt -> generate -> pick -> edit chain.
    fn sample_graph() -> (Vec<NodeDef>, Vec<EdgeDef>) {
        let nodes = vec![
            node("p1", NodeKind::Prompt, json!({"text": "a portrait"})),
            node("g1", NodeKind::GenerateImage, json!({"model": "sdxl"})),
            node("k1", NodeKind::Pick, json!({})),
            node("e1", NodeKind::EditImage, json!({"instruction": "warmer light"})),
        ];
        let edges = vec![
            edge("p1", "text", "g1", "prompt"),
            edge("g1", "images", "k1", "images"),
            edge("k1", "image", "e1", "image"),
        ];
        (nodes, edges)
    }

    // -- execution_order ------------------------------------------------------

    #[test]
    fn order_visits_every_node_once() {
        let (nodes, edges) = sample_graph();
        let order = execution_order(&nodes, &edges).unwrap();
        assert_eq!(order.len(), nodes.len());
        for n in &nodes {
            assert_eq!(order.iter().filter(|id| **id == n.id).count(), 1);
        }
    }

    #[test]
    fn order_respects_every_edge() {
        let (nodes, edges) = sample_graph();
        let order = execution_order(&nodes, &edges).unwrap();
        let pos: HashMap<&str, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for e in &edges {
            assert!(
                pos[e.source.as_str()] < pos[e.target.as_str()],
                "{} must run before {}",
                e.source,
                e.target
            );
        }
    }

    #[test]
    fn diamond_orders_both_branches_before_join() {
        // p1 feeds two generators; both feed independent picks which feed
        // a final edit through... keep it simple: two independent roots.
        let nodes = vec![
            node("a", NodeKind::Prompt, json!({"text": "x"})),
            node("b", NodeKind::Prompt, json!({"text": "y"})),
            node("g", NodeKind::GenerateImage, json!({"model": "sdxl"})),
        ];
        let edges = vec![edge("a", "text", "g", "prompt")];
        let order = execution_order(&nodes, &edges).unwrap();
        let pos: HashMap<&str, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        assert!(pos["a"] < pos["g"]);
        assert!(pos.contains_key("b"));
    }

    #[test]
    fn cycle_is_reported_not_looped() {
        let nodes = vec![
            node("e1", NodeKind::EditImage, json!({"instruction": "i"})),
            node("e2", NodeKind::EditImage, json!({"instruction": "i"})),
        ];
        let edges = vec![
            edge("e1", "image", "e2", "image"),
            edge("e2", "image", "e1", "image"),
        ];
        let err = execution_order(&nodes, &edges).unwrap_err();
        assert_matches!(err, CoreError::Cycle(_));
        assert!(err.to_string().contains("e1"));
    }

    // -- validate_graph -------------------------------------------------------

    #[test]
    fn valid_graph_passes() {
        let (nodes, edges) = sample_graph();
        assert!(validate_graph(&nodes, &edges).is_ok());
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let nodes = vec![
            node("p1", NodeKind::Prompt, json!({"text": "a"})),
            node("p1", NodeKind::Prompt, json!({"text": "b"})),
        ];
        let err = validate_graph(&nodes, &[]).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn edge_to_missing_node_rejected() {
        let nodes = vec![node("p1", NodeKind::Prompt, json!({"text": "a"}))];
        let edges = vec![edge("p1", "text", "ghost", "prompt")];
        assert!(validate_graph(&nodes, &edges).is_err());
    }

    #[test]
    fn unknown_port_rejected() {
        let (nodes, mut edges) = sample_graph();
        edges[0].source_port = "paragraph".into();
        let err = validate_graph(&nodes, &edges).unwrap_err();
        assert!(err.to_string().contains("paragraph"));
    }

    #[test]
    fn batch_into_single_image_input_rejected() {
        // generate_image.images (image_batch) -> edit_image.image (image)
        let nodes = vec![
            node("p1", NodeKind::Prompt, json!({"text": "a"})),
            node("g1", NodeKind::GenerateImage, json!({"model": "sdxl"})),
            node("e1", NodeKind::EditImage, json!({"instruction": "i"})),
        ];
        let edges = vec![
            edge("p1", "text", "g1", "prompt"),
            edge("g1", "images", "e1", "image"),
        ];
        let err = validate_graph(&nodes, &edges).unwrap_err();
        assert_matches!(err, CoreError::PortIncompatibility(_));
    }

    #[test]
    fn unwired_required_input_rejected() {
        let nodes = vec![node("e1", NodeKind::EditImage, json!({"instruction": "i"}))];
        let err = validate_graph(&nodes, &[]).unwrap_err();
        assert!(err.to_string().contains("requires an edge"));
    }

    #[test]
    fn cyclic_graph_rejected_at_save() {
        let nodes = vec![
            node("e1", NodeKind::EditImage, json!({"instruction": "i"})),
            node("e2", NodeKind::EditImage, json!({"instruction": "i"})),
        ];
        let edges = vec![
            edge("e1", "image", "e2", "image"),
            edge("e2", "image", "e1", "image"),
        ];
        assert_matches!(validate_graph(&nodes, &edges), Err(CoreError::Cycle(_)));
    }

    #[test]
    fn bad_node_config_rejected_at_save() {
        let nodes = vec![node("g1", NodeKind::GenerateImage, json!({}))];
        assert!(validate_graph(&nodes, &[]).is_err());
    }

    // -- incoming_edges -------------------------------------------------------

    #[test]
    fn incoming_edges_filters_by_target() {
        let (_, edges) = sample_graph();
        let incoming = incoming_edges("k1", &edges);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source, "g1");
    }
}
