use super::error::Result;
use super::force::write_fitted;
use super::sizing::{FLAT_DEFAULT_SIZE, collect_size};
use super::solver::{
    DagreSolver, LayoutSolver, OPT_ALGORITHM, OPT_BETWEEN_LAYERS, OPT_DIRECTION, OPT_EDGE_EDGE,
    OPT_EDGE_NODE, OPT_NODE_NODE, SolverEdge, SolverGraph, SolverNode,
};
use super::types::Viewport;
use super::viewport::{Placed, fit_to_viewport};
use crate::ir::{Direction, GraphEdge, GraphNode, Position};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct FlatLayeredOptions {
    pub direction: Direction,
    pub node_node_spacing: f64,
    pub edge_node_spacing: f64,
    pub edge_edge_spacing: f64,
    pub overrides: BTreeMap<String, String>,
}

impl Default for FlatLayeredOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Right,
            node_node_spacing: 40.0,
            edge_node_spacing: 20.0,
            edge_edge_spacing: 10.0,
            overrides: BTreeMap::new(),
        }
    }
}

/// Layered layout of a flat graph, fitted into `viewport`.
pub async fn layout_flat_layered(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    viewport: &Viewport,
    options: &FlatLayeredOptions,
) -> Result<Vec<GraphNode>> {
    layout_flat_layered_with(&DagreSolver, nodes, edges, viewport, options).await
}

pub async fn layout_flat_layered_with<S: LayoutSolver>(
    solver: &S,
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    viewport: &Viewport,
    options: &FlatLayeredOptions,
) -> Result<Vec<GraphNode>> {
    let mut seen = HashSet::new();
    let members: Vec<usize> = (0..nodes.len())
        .filter(|idx| !nodes[*idx].hidden && seen.insert(nodes[*idx].id.as_str()))
        .collect();
    if members.is_empty() {
        return Ok(nodes.to_vec());
    }
    let sizes: Vec<_> = members
        .iter()
        .map(|idx| collect_size(&nodes[*idx], FLAT_DEFAULT_SIZE))
        .collect();

    let mut layout_options = BTreeMap::new();
    let mut set = |key: &str, value: String| {
        layout_options.insert(key.to_string(), value);
    };
    set(OPT_ALGORITHM, "layered".into());
    set(OPT_DIRECTION, options.direction.as_token().into());
    set(OPT_NODE_NODE, options.node_node_spacing.to_string());
    set(OPT_EDGE_NODE, options.edge_node_spacing.to_string());
    set(OPT_EDGE_EDGE, options.edge_edge_spacing.to_string());
    set(OPT_BETWEEN_LAYERS, "40".into());
    set("elk.layered.nodePlacement.favorStraightEdges", "true".into());
    for (key, value) in &options.overrides {
        set(key, value.clone());
    }

    let graph = SolverGraph {
        id: "root".to_string(),
        layout_options,
        children: members
            .iter()
            .zip(&sizes)
            .map(|(idx, size)| SolverNode::leaf(nodes[*idx].id.clone(), size.width, size.height))
            .collect(),
        edges: edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| seen.contains(edge.source.as_str()) && seen.contains(edge.target.as_str()))
            .map(|(idx, edge)| SolverEdge {
                id: edge.id.clone().unwrap_or_else(|| format!("e-{idx}")),
                source: edge.source.clone(),
                target: edge.target.clone(),
                source_port: None,
                target_port: None,
            })
            .collect(),
        ..SolverGraph::default()
    };

    let solved = solver.solve(graph).await?;
    let positions: HashMap<&str, Position> = solved
        .children
        .iter()
        .map(|child| (child.id.as_str(), Position::new(child.x, child.y)))
        .collect();

    let boxes: Vec<Placed> = members
        .iter()
        .zip(&sizes)
        .map(|(idx, size)| Placed {
            position: positions.get(nodes[*idx].id.as_str()).copied(),
            size: *size,
        })
        .collect();
    let fitted = fit_to_viewport(&boxes, viewport);
    Ok(write_fitted(nodes, &members, &sizes, &fitted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn chain_flows_left_to_right() {
        let nodes = vec![GraphNode::new("a"), GraphNode::new("b"), GraphNode::new("c")];
        let edges = vec![GraphEdge::new("a", "b"), GraphEdge::new("b", "c")];
        let out = block_on(layout_flat_layered(
            &nodes,
            &edges,
            &Viewport::new(1200.0, 800.0),
            &FlatLayeredOptions::default(),
        ))
        .unwrap();
        assert!(out[0].position.x < out[1].position.x);
        assert!(out[1].position.x < out[2].position.x);
        for node in &out {
            assert!(node.position.x >= 24.0 - 1e-6);
        }
    }

    #[test]
    fn dangling_edges_and_hidden_nodes_are_skipped() {
        let nodes = vec![GraphNode::new("a"), GraphNode::new("h").at(3.0, 4.0).hidden()];
        let edges = vec![GraphEdge::new("a", "h"), GraphEdge::new("a", "missing")];
        let out = block_on(layout_flat_layered(
            &nodes,
            &edges,
            &Viewport::new(400.0, 300.0),
            &FlatLayeredOptions::default(),
        ))
        .unwrap();
        assert_eq!(out[1].position, Position::new(3.0, 4.0));
        assert!(out[0].position.x >= 24.0 - 1e-6);
    }
}
