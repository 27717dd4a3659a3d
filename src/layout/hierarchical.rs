use super::error::Result;
use super::sizing::SizeFn;
use super::solver::{
    DagreSolver, LayoutSolver, OPT_ALGORITHM, OPT_ASPECT_RATIO, OPT_BETWEEN_LAYERS, OPT_COMPONENT,
    OPT_DIRECTION, OPT_EDGE_EDGE, OPT_NODE_NODE, OPT_PADDING, OPT_PORT_CONSTRAINTS, SolverEdge,
    SolverGraph, SolverNode, SolverPort, lookup_option,
};
use super::tree::{CompoundTree, TreeKind, TreeOptions};
use super::types::{DEFAULT_CLUSTER_PADDING, Padding};
use crate::handles::{PortHint, collect_ports};
use crate::ir::{Direction, Graph, Position, Size};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_CHILD_SIZE: Size = Size::new(160.0, 40.0);

#[derive(Clone)]
pub struct HierarchicalOptions {
    pub direction: Direction,
    pub child_default_size: Size,
    pub size_by_node: Option<Arc<SizeFn<'static>>>,
    /// Padding of compound nodes. When set it is also applied around the root.
    pub cluster_padding: Option<Padding>,
    /// Raw solver options applied last, on top of the computed ones.
    pub solver_overrides: BTreeMap<String, String>,
    pub viewport_size: Option<Size>,
}

impl Default for HierarchicalOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Down,
            child_default_size: DEFAULT_CHILD_SIZE,
            size_by_node: None,
            cluster_padding: None,
            solver_overrides: BTreeMap::new(),
            viewport_size: None,
        }
    }
}

impl std::fmt::Debug for HierarchicalOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchicalOptions")
            .field("direction", &self.direction)
            .field("child_default_size", &self.child_default_size)
            .field("size_by_node", &self.size_by_node.is_some())
            .field("cluster_padding", &self.cluster_padding)
            .field("solver_overrides", &self.solver_overrides)
            .field("viewport_size", &self.viewport_size)
            .finish()
    }
}

/// Lays out a graph whose nodes nest through `parentId`, using the dagre
/// backed solver.
pub async fn layout_hierarchical(graph: &Graph, options: &HierarchicalOptions) -> Result<Graph> {
    layout_hierarchical_with(&DagreSolver, graph, options).await
}

/// Same as [`layout_hierarchical`] with an injected solver.
///
/// Returned positions are relative to the parent's top-left. Nodes whose
/// parent does not resolve to a visible node are positioned in the root frame.
pub async fn layout_hierarchical_with<S: LayoutSolver>(
    solver: &S,
    graph: &Graph,
    options: &HierarchicalOptions,
) -> Result<Graph> {
    let mut out = graph.clone();
    if graph.nodes.is_empty() {
        return Ok(out);
    }

    let tree = CompoundTree::build(
        &graph.nodes,
        &TreeOptions {
            default_size: options.child_default_size,
            size_by_node: options.size_by_node.as_deref(),
            cluster_padding: options
                .cluster_padding
                .unwrap_or(Padding::uniform(DEFAULT_CLUSTER_PADDING)),
        },
    );
    if tree.real_len() == 0 {
        return Ok(out);
    }

    let visible: HashSet<&str> = graph
        .nodes
        .iter()
        .filter(|node| !node.hidden)
        .map(|node| node.id.as_str())
        .collect();
    let edges: Vec<_> = graph
        .edges
        .iter()
        .filter(|edge| {
            visible.contains(edge.source.as_str()) && visible.contains(edge.target.as_str())
        })
        .cloned()
        .collect();
    let ports = collect_ports(&edges, options.direction);

    let solver_graph = SolverGraph {
        id: "root".to_string(),
        layout_options: root_options(options, has_virtual_groups(&tree)),
        children: tree
            .root()
            .children
            .iter()
            .map(|slot| solver_node(&tree, *slot, &ports))
            .collect(),
        edges: edges
            .iter()
            .map(|edge| SolverEdge {
                id: edge.layout_id(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                source_port: edge
                    .source_handle
                    .as_deref()
                    .filter(|handle| !handle.is_empty())
                    .map(|handle| port_id(&edge.source, handle)),
                target_port: edge
                    .target_handle
                    .as_deref()
                    .filter(|handle| !handle.is_empty())
                    .map(|handle| port_id(&edge.target, handle)),
            })
            .collect(),
        ..SolverGraph::default()
    };
    debug!(
        nodes = tree.real_len(),
        edges = solver_graph.edges.len(),
        "hierarchical layout"
    );

    let solved = solver.solve(solver_graph).await?;

    let mut placed: HashMap<String, (Position, Option<f64>, Option<f64>)> = HashMap::new();
    for child in &solved.children {
        collect_placements(child, Position::default(), &tree, &mut placed);
    }
    let mut written: HashSet<String> = HashSet::new();
    for node in out.nodes.iter_mut().filter(|node| !node.hidden) {
        let Some((position, width, height)) = placed.get(&node.id) else {
            continue;
        };
        // The tree keeps the first copy of a repeated id; later copies stay put.
        if !written.insert(node.id.clone()) {
            warn!(id = %node.id, "duplicate node id left at its input position");
            continue;
        }
        node.position = *position;
        if width.is_some() {
            node.width = *width;
        }
        if height.is_some() {
            node.height = *height;
        }
    }
    Ok(out)
}

/// Whether some nodes hang off a parent that is not in the graph.
fn has_virtual_groups(tree: &CompoundTree) -> bool {
    tree.root()
        .children
        .iter()
        .any(|slot| tree.nodes[*slot].is_virtual())
}

/// Root solver options. Row packing of components would split a virtual group
/// from its neighbours, so the viewport aspect ratio is only requested when
/// there are none.
fn root_options(options: &HierarchicalOptions, virtual_groups: bool) -> BTreeMap<String, String> {
    let mut layout_options = BTreeMap::new();
    let mut set = |key: &str, value: String| {
        layout_options.insert(key.to_string(), value);
    };
    set(OPT_ALGORITHM, "layered".into());
    set(OPT_DIRECTION, options.direction.as_token().into());
    let overridden_aspect = lookup_option(&options.solver_overrides, OPT_ASPECT_RATIO).is_some();
    if let Some(size) = options.viewport_size
        && size.width > 0.0
        && size.height > 0.0
        && !overridden_aspect
        && !virtual_groups
    {
        set(OPT_ASPECT_RATIO, (size.width / size.height).to_string());
    }
    set(OPT_NODE_NODE, "20".into());
    set(OPT_BETWEEN_LAYERS, "80".into());
    set(OPT_EDGE_EDGE, "15".into());
    set(OPT_COMPONENT, "50".into());
    set("elk.edgeRouting", "ORTHOGONAL".into());
    set("elk.layered.mergeEdges", "true".into());
    set("elk.layered.nodePlacement.strategy", "NETWORK_SIMPLEX".into());
    if let Some(padding) = options.cluster_padding {
        set(OPT_PADDING, padding.to_elk_string());
    }
    for (key, value) in &options.solver_overrides {
        set(key, value.clone());
    }
    layout_options
}

fn port_id(node: &str, handle: &str) -> String {
    format!("{node}:{handle}")
}

fn solver_node(
    tree: &CompoundTree,
    slot: usize,
    ports: &BTreeMap<String, Vec<PortHint>>,
) -> SolverNode {
    let entry = &tree.nodes[slot];
    let mut node = match &entry.kind {
        TreeKind::Leaf { size } => SolverNode::leaf(entry.id.clone(), size.width, size.height),
        TreeKind::Compound { padding } | TreeKind::Virtual { padding } => SolverNode::compound(
            entry.id.clone(),
            *padding,
            entry
                .children
                .iter()
                .map(|child| solver_node(tree, *child, ports))
                .collect(),
        ),
        TreeKind::Root => SolverNode::leaf(entry.id.clone(), 0.0, 0.0),
    };
    if let Some(hints) = ports.get(&entry.id).filter(|_| !entry.is_virtual()) {
        node.ports = hints
            .iter()
            .map(|hint| SolverPort {
                id: port_id(&entry.id, &hint.handle),
                side: hint.side,
            })
            .collect();
        node.layout_options
            .insert(OPT_PORT_CONSTRAINTS.to_string(), "FIXED_ORDER".to_string());
    }
    node
}

/// Records solver output per real node. Members of a virtual group are shifted
/// by the group origin, since the group itself is never emitted.
fn collect_placements(
    node: &SolverNode,
    offset: Position,
    tree: &CompoundTree,
    placed: &mut HashMap<String, (Position, Option<f64>, Option<f64>)>,
) {
    let is_virtual = tree.slot_of(&node.id).is_none();
    let position = Position::new(node.x, node.y).offset(offset);
    if is_virtual {
        for child in &node.children {
            collect_placements(child, position, tree, placed);
        }
        return;
    }
    placed.insert(node.id.clone(), (position, node.width, node.height));
    for child in &node.children {
        collect_placements(child, Position::default(), tree, placed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::GraphNode;
    use crate::layout::solver::SolverError;
    use futures::executor::block_on;
    use std::sync::Mutex;

    /// Records the graph it receives and places nodes on a fixed grid.
    #[derive(Default)]
    struct RecordingSolver {
        seen: Mutex<Option<SolverGraph>>,
    }

    impl LayoutSolver for RecordingSolver {
        async fn solve(&self, mut graph: SolverGraph) -> std::result::Result<SolverGraph, SolverError> {
            *self.seen.lock().unwrap() = Some(graph.clone());
            fn place(nodes: &mut [SolverNode]) {
                for (idx, node) in nodes.iter_mut().enumerate() {
                    node.x = 10.0 * (idx as f64 + 1.0);
                    node.y = 5.0;
                    place(&mut node.children);
                }
            }
            place(&mut graph.children);
            Ok(graph)
        }
    }

    #[test]
    fn builds_solver_options() {
        let solver = RecordingSolver::default();
        let graph = Graph::new(vec![GraphNode::new("a")], Vec::new());
        let mut options = HierarchicalOptions {
            viewport_size: Some(Size::new(1600.0, 800.0)),
            cluster_padding: Some(Padding::new(38.0, 20.0, 20.0, 20.0)),
            ..HierarchicalOptions::default()
        };
        block_on(layout_hierarchical_with(&solver, &graph, &options)).unwrap();
        let seen = solver.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.option(OPT_DIRECTION), Some("DOWN"));
        assert_eq!(seen.option(OPT_ASPECT_RATIO), Some("2"));
        assert_eq!(seen.option(OPT_NODE_NODE), Some("20"));
        assert_eq!(
            seen.option(OPT_PADDING),
            Some("[top=38,left=20,bottom=20,right=20]")
        );
        assert_eq!(seen.children[0].width, Some(160.0));

        options
            .solver_overrides
            .insert("org.eclipse.elk.aspectRatio".into(), "0.5".into());
        block_on(layout_hierarchical_with(&solver, &graph, &options)).unwrap();
        let seen = solver.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.option(OPT_ASPECT_RATIO), Some("0.5"));
    }

    #[test]
    fn virtual_members_land_in_the_root_frame() {
        let solver = RecordingSolver::default();
        let graph = Graph::new(
            vec![
                GraphNode::new("a").with_parent("G"),
                GraphNode::new("b").with_parent("G"),
            ],
            Vec::new(),
        );
        let out = block_on(layout_hierarchical_with(
            &solver,
            &graph,
            &HierarchicalOptions::default(),
        ))
        .unwrap();
        assert_eq!(out.nodes[0].position, Position::new(20.0, 10.0));
        assert_eq!(out.nodes[1].position, Position::new(30.0, 10.0));
        assert_eq!(out.nodes.len(), 2);
    }

    #[test]
    fn virtual_groups_disable_row_packing() {
        let solver = RecordingSolver::default();
        let graph = Graph::new(
            vec![
                GraphNode::new("a").with_parent("ghost"),
                GraphNode::new("c"),
            ],
            Vec::new(),
        );
        let options = HierarchicalOptions {
            viewport_size: Some(Size::new(1600.0, 900.0)),
            ..HierarchicalOptions::default()
        };
        block_on(layout_hierarchical_with(&solver, &graph, &options)).unwrap();
        let seen = solver.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.option(OPT_ASPECT_RATIO), None);
    }

    #[test]
    fn repeated_ids_keep_later_copies_in_place() {
        let solver = RecordingSolver::default();
        let graph = Graph::new(
            vec![
                GraphNode::new("a"),
                GraphNode::new("b"),
                GraphNode::new("a").at(500.0, 600.0),
            ],
            Vec::new(),
        );
        let out = block_on(layout_hierarchical_with(
            &solver,
            &graph,
            &HierarchicalOptions::default(),
        ))
        .unwrap();
        assert_eq!(out.nodes[0].position, Position::new(10.0, 5.0));
        assert_eq!(out.nodes[1].position, Position::new(20.0, 5.0));
        assert_eq!(out.nodes[2].position, Position::new(500.0, 600.0));
        assert_eq!(out.nodes[2].width, None);
    }

    #[test]
    fn handles_become_ports() {
        let solver = RecordingSolver::default();
        let graph = Graph::new(
            vec![GraphNode::new("a"), GraphNode::new("b")],
            vec![crate::ir::GraphEdge::new("a", "b").with_handles(Some("bottom"), Some("top"))],
        );
        block_on(layout_hierarchical_with(
            &solver,
            &graph,
            &HierarchicalOptions::default(),
        ))
        .unwrap();
        let seen = solver.seen.lock().unwrap().take().unwrap();
        let a = &seen.children[0];
        assert_eq!(a.ports[0].id, "a:bottom");
        assert_eq!(
            a.layout_options.get(OPT_PORT_CONSTRAINTS).map(String::as_str),
            Some("FIXED_ORDER")
        );
        assert_eq!(seen.edges[0].source_port.as_deref(), Some("a:bottom"));
        assert_eq!(seen.edges[0].target_port.as_deref(), Some("b:top"));
    }

    #[test]
    fn empty_graph_skips_the_solver() {
        let solver = RecordingSolver::default();
        let out = block_on(layout_hierarchical_with(
            &solver,
            &Graph::default(),
            &HierarchicalOptions::default(),
        ))
        .unwrap();
        assert!(out.is_empty());
        assert!(solver.seen.lock().unwrap().is_none());
    }
}
