//! View state of one graph context: the loaded graph, the committed layout and
//! the display toggles that decide node visibility and edge decoration.

use crate::config::Config;
use crate::decoration::{
    EdgeContext, EdgeDecoration, GraphTopology, IamDisplay, RES_RES_TAG, decorate_edge,
};
use crate::handles::{assign_closest_handles, measure_graph};
use crate::ir::{Graph, GraphEdge, GraphNode, Position, Size};
use crate::layout::{self, HierarchicalOptions};
use crate::theme::EdgeTheme;
use std::collections::BTreeMap;
use tracing::debug;

/// Id of the synthetic container that groups IAM roles.
pub const IAM_GROUP_ID: &str = "IAM";

/// Visibility, extent and type rules applied before every layout.
pub fn apply_node_policy(
    mut nodes: Vec<GraphNode>,
    topology: GraphTopology,
    iam_display: IamDisplay,
) -> Vec<GraphNode> {
    for node in &mut nodes {
        let is_iam = node.kind.as_deref() == Some("iam") || node.id == IAM_GROUP_ID;
        node.hidden = is_iam && iam_display != IamDisplay::ResRole;
        match topology {
            GraphTopology::Hierarchical => node.extent = Some("parent".to_string()),
            GraphTopology::Flat => node.kind = Some("resource".to_string()),
        }
    }
    nodes
}

pub fn apply_edge_policy(mut edges: Vec<GraphEdge>, topology: GraphTopology) -> Vec<GraphEdge> {
    if topology == GraphTopology::Flat {
        for edge in &mut edges {
            edge.data.get_or_insert_with(Default::default).kind = Some(RES_RES_TAG.to_string());
        }
    }
    edges
}

/// Runs the layered engine with the preset leaf size of `topology`.
pub async fn layout_for_topology(
    graph: &Graph,
    topology: GraphTopology,
    config: &Config,
    viewport: Option<Size>,
) -> layout::Result<Graph> {
    let child_default_size = match topology {
        GraphTopology::Hierarchical => config.presets.resource,
        GraphTopology::Flat => config.presets.non_hierarchical,
    };
    let options = HierarchicalOptions {
        direction: config.hierarchical.direction,
        child_default_size,
        cluster_padding: Some(config.hierarchical.cluster_padding),
        solver_overrides: config.hierarchical.overrides.clone(),
        viewport_size: viewport,
        ..HierarchicalOptions::default()
    };
    layout::layout_hierarchical(graph, &options).await
}

/// A layout request. Only the newest ticket may be committed.
#[derive(Debug, Clone)]
pub struct LayoutTicket {
    pub generation: u64,
    pub topology: GraphTopology,
    pub graph: Graph,
}

#[derive(Debug, Clone)]
pub struct DecoratedEdge {
    pub edge: GraphEdge,
    pub decoration: EdgeDecoration,
}

#[derive(Debug, Default)]
pub struct ViewState {
    graph: Graph,
    laid_out: Graph,
    iam_display: IamDisplay,
    topology: GraphTopology,
    selected: Option<String>,
    hovered: Option<String>,
    show_edge_labels: bool,
    generation: u64,
}

impl ViewState {
    pub fn new(iam_display: IamDisplay, topology: GraphTopology) -> Self {
        Self {
            iam_display,
            topology,
            ..Self::default()
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Last committed layout.
    pub fn laid_out(&self) -> &Graph {
        &self.laid_out
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn iam_display(&self) -> IamDisplay {
        self.iam_display
    }

    pub fn topology(&self) -> GraphTopology {
        self.topology
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn show_edge_labels(&self) -> bool {
        self.show_edge_labels
    }

    pub fn set_graph(&mut self, graph: Graph) -> LayoutTicket {
        self.graph = graph;
        self.selected = None;
        self.hovered = None;
        self.ticket()
    }

    pub fn set_iam_display(&mut self, iam_display: IamDisplay) -> Option<LayoutTicket> {
        if self.iam_display == iam_display {
            return None;
        }
        self.iam_display = iam_display;
        Some(self.ticket())
    }

    /// Switching topology needs the other variant of the graph, so callers pass
    /// it along with the new topology.
    pub fn set_topology(&mut self, topology: GraphTopology, graph: Graph) -> LayoutTicket {
        self.topology = topology;
        self.set_graph(graph)
    }

    pub fn select(&mut self, id: Option<String>) -> bool {
        if self.selected == id {
            return false;
        }
        self.selected = id;
        true
    }

    pub fn hover(&mut self, id: Option<String>) -> bool {
        if self.hovered == id {
            return false;
        }
        self.hovered = id;
        true
    }

    pub fn set_show_edge_labels(&mut self, show: bool) -> bool {
        if self.show_edge_labels == show {
            return false;
        }
        self.show_edge_labels = show;
        true
    }

    fn ticket(&mut self) -> LayoutTicket {
        self.generation += 1;
        let graph = Graph::new(
            apply_node_policy(self.graph.nodes.clone(), self.topology, self.iam_display),
            apply_edge_policy(self.graph.edges.clone(), self.topology),
        );
        LayoutTicket {
            generation: self.generation,
            topology: self.topology,
            graph,
        }
    }

    /// Stores a finished layout unless a newer ticket was issued meanwhile.
    pub fn commit_layout(&mut self, generation: u64, graph: Graph) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale layout");
            return false;
        }
        self.laid_out = graph;
        self.refresh_edges();
        true
    }

    /// Re-picks the closest handle pair of every edge between measured nodes.
    pub fn refresh_edges(&mut self) {
        let absolute: BTreeMap<String, Position> =
            self.laid_out.absolute_positions().into_iter().collect();
        let measured = measure_graph(&self.laid_out.nodes, &absolute);
        for edge in &mut self.laid_out.edges {
            let (Some(source), Some(target)) = (measured.get(&edge.source), measured.get(&edge.target))
            else {
                continue;
            };
            let assignment = assign_closest_handles(source, target);
            if let Some(handle) = assignment.source_handle {
                edge.source_handle = handle;
            }
            if let Some(handle) = assignment.target_handle {
                edge.target_handle = handle;
            }
        }
    }

    pub fn decorated_edges(&self, theme: &EdgeTheme) -> Vec<DecoratedEdge> {
        self.laid_out
            .edges
            .iter()
            .map(|edge| {
                let context = EdgeContext::for_edge(
                    edge,
                    self.selected.as_deref(),
                    self.hovered.as_deref(),
                    self.iam_display,
                    self.show_edge_labels,
                    self.topology,
                );
                DecoratedEdge {
                    edge: edge.clone(),
                    decoration: decorate_edge(&context, theme),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Graph {
        Graph::new(
            vec![
                GraphNode::new("IAM").with_kind("aws_container"),
                GraphNode::new("role").with_kind("iam").with_parent("IAM"),
                GraphNode::new("bucket").with_kind("resource"),
                GraphNode::new("queue").with_kind("resource").hidden(),
            ],
            vec![
                GraphEdge::new("role", "bucket").with_type("iam-res-role"),
                GraphEdge::new("bucket", "queue").with_type("other-res-res"),
            ],
        )
    }

    #[test]
    fn iam_nodes_follow_the_display_mode() {
        let nodes = apply_node_policy(sample().nodes, GraphTopology::Hierarchical, IamDisplay::ResRes);
        let hidden: Vec<_> = nodes.iter().filter(|n| n.hidden).map(|n| n.id.as_str()).collect();
        assert_eq!(hidden, vec!["IAM", "role"]);
        assert!(nodes.iter().all(|n| n.extent.as_deref() == Some("parent")));

        let nodes = apply_node_policy(sample().nodes, GraphTopology::Hierarchical, IamDisplay::ResRole);
        assert!(nodes.iter().all(|n| !n.hidden));
    }

    #[test]
    fn flat_topology_retypes_nodes_and_edges() {
        let nodes = apply_node_policy(sample().nodes, GraphTopology::Flat, IamDisplay::Off);
        assert!(nodes.iter().all(|n| n.kind.as_deref() == Some("resource")));
        assert!(nodes.iter().find(|n| n.id == "role").unwrap().hidden);

        let edges = apply_edge_policy(sample().edges, GraphTopology::Flat);
        assert!(edges.iter().all(|e| e.kind() == Some(RES_RES_TAG)));
        let edges = apply_edge_policy(sample().edges, GraphTopology::Hierarchical);
        assert_eq!(edges[0].kind(), Some("iam-res-role"));
    }

    #[test]
    fn stale_tickets_are_discarded() {
        let mut state = ViewState::default();
        let first = state.set_graph(sample());
        let second = state.set_iam_display(IamDisplay::ResRole).unwrap();
        assert!(state.set_iam_display(IamDisplay::ResRole).is_none());

        assert!(!state.commit_layout(first.generation, first.graph));
        assert!(state.laid_out().is_empty());
        assert!(state.commit_layout(second.generation, second.graph));
        assert!(state.laid_out().nodes.iter().all(|n| !n.hidden));
    }

    #[test]
    fn toggles_report_changes() {
        let mut state = ViewState::default();
        assert!(state.select(Some("bucket".into())));
        assert!(!state.select(Some("bucket".into())));
        assert!(state.hover(Some("role".into())));
        assert!(state.hover(None));
        assert!(state.set_show_edge_labels(true));
        assert!(!state.set_show_edge_labels(true));
    }

    #[test]
    fn committed_layout_gets_closest_handles() {
        let mut state = ViewState::default();
        let ticket = state.set_graph(Graph::new(
            vec![
                GraphNode::new("a").with_kind("resource").with_size(80.0, 75.0).at(0.0, 0.0),
                GraphNode::new("b").with_kind("resource").with_size(80.0, 75.0).at(300.0, 0.0),
            ],
            vec![GraphEdge::new("a", "b").with_type("other-res-res")],
        ));
        assert!(state.commit_layout(ticket.generation, ticket.graph));
        let edge = &state.laid_out().edges[0];
        assert_eq!(edge.source_handle.as_deref(), Some("right"));
        assert_eq!(edge.target_handle.as_deref(), Some("left"));

        state.select(Some("a".into()));
        let decorated = state.decorated_edges(&EdgeTheme::default());
        let style = decorated[0].decoration.style.as_ref().unwrap();
        assert_eq!(style.stroke, EdgeTheme::default().stroke_hovered_sel.r2r);
    }
}
