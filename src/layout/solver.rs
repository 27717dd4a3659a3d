//! Compound layered solver.
//!
//! The graph handed to a [`LayoutSolver`] is a nested tree of boxes with
//! string keyed layout options. Solvers return the same tree with every
//! node's `x`/`y` filled in relative to its parent's top-left, and with the
//! width/height of compound nodes computed from their content.

use super::types::{Padding, PortSide, SOLVER_DEFAULT_PADDING};
use crate::ir::Direction;
use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use tracing::debug;

pub const OPT_ALGORITHM: &str = "elk.algorithm";
pub const OPT_DIRECTION: &str = "elk.direction";
pub const OPT_NODE_NODE: &str = "elk.spacing.nodeNode";
pub const OPT_BETWEEN_LAYERS: &str = "elk.layered.spacing.nodeNodeBetweenLayers";
pub const OPT_EDGE_EDGE: &str = "elk.spacing.edgeEdge";
pub const OPT_EDGE_NODE: &str = "elk.spacing.edgeNode";
pub const OPT_COMPONENT: &str = "elk.spacing.componentComponent";
pub const OPT_ASPECT_RATIO: &str = "elk.aspectRatio";
pub const OPT_PADDING: &str = "elk.padding";
pub const OPT_PORT_CONSTRAINTS: &str = "elk.portConstraints";

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("edge {edge} references unknown node {node}")]
    UnknownEndpoint { edge: String, node: String },
    #[error("duplicate node id {0}")]
    DuplicateNode(String),
    #[error("solver panicked: {0}")]
    Panicked(String),
    #[error("solver rejected the graph: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverPort {
    pub id: String,
    pub side: PortSide,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub layout_options: BTreeMap<String, String>,
    pub ports: Vec<SolverPort>,
    pub children: Vec<SolverNode>,
}

impl SolverNode {
    pub fn leaf(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn compound(id: impl Into<String>, padding: Padding, children: Vec<SolverNode>) -> Self {
        let mut layout_options = BTreeMap::new();
        layout_options.insert(OPT_PADDING.to_string(), padding.to_elk_string());
        Self {
            id: id.into(),
            layout_options,
            children,
            ..Self::default()
        }
    }

    /// Depth-first walk over this node and its descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a SolverNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_port: Option<String>,
    pub target_port: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverGraph {
    pub id: String,
    pub layout_options: BTreeMap<String, String>,
    pub children: Vec<SolverNode>,
    pub edges: Vec<SolverEdge>,
    pub width: f64,
    pub height: f64,
}

impl SolverGraph {
    pub fn option(&self, key: &str) -> Option<&str> {
        lookup_option(&self.layout_options, key)
    }
}

/// Looks an option up by its canonical `elk.` key, accepting the long
/// `org.eclipse.elk.` spelling too.
pub fn lookup_option<'a>(options: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    options
        .iter()
        .rev()
        .find(|(candidate, _)| normalize_key(candidate) == key)
        .map(|(_, value)| value.as_str())
}

fn normalize_key(key: &str) -> &str {
    key.strip_prefix("org.eclipse.").unwrap_or(key)
}

/// The seam between the layout engines and the layered solver.
pub trait LayoutSolver {
    fn solve(
        &self,
        graph: SolverGraph,
    ) -> impl Future<Output = Result<SolverGraph, SolverError>> + Send;
}

/// Layered solver backed by dagre, one flat dagre run per containment level.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagreSolver;

impl LayoutSolver for DagreSolver {
    async fn solve(&self, graph: SolverGraph) -> Result<SolverGraph, SolverError> {
        let started = Instant::now();
        let nodes = count_nodes(&graph.children);
        let edges = graph.edges.len();
        let solved = catch_unwind(AssertUnwindSafe(|| solve_layered(graph)))
            .map_err(|payload| SolverError::Panicked(panic_message(payload.as_ref())))??;
        debug!(
            nodes,
            edges,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "layered solve"
        );
        Ok(solved)
    }
}

fn count_nodes(nodes: &[SolverNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_nodes(&node.children))
        .sum()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct LayeredSettings {
    direction: Direction,
    node_node: f64,
    between_layers: f64,
    component: f64,
    aspect_ratio: Option<f64>,
    padding: Padding,
}

impl LayeredSettings {
    fn from_options(options: &BTreeMap<String, String>) -> Result<Self, SolverError> {
        if let Some(algorithm) = lookup_option(options, OPT_ALGORITHM) {
            let algorithm = algorithm.trim().to_ascii_lowercase();
            if algorithm != "layered" && !algorithm.ends_with(".layered") {
                return Err(SolverError::Rejected(format!(
                    "unsupported algorithm {algorithm}"
                )));
            }
        }
        let direction = match lookup_option(options, OPT_DIRECTION) {
            Some(raw) => Direction::from_token(raw)
                .ok_or_else(|| SolverError::Rejected(format!("unknown direction {raw}")))?,
            None => Direction::Right,
        };
        let number = |key: &str, default: f64| -> Result<f64, SolverError> {
            match lookup_option(options, key) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| SolverError::Rejected(format!("{key} is not a number: {raw}"))),
                None => Ok(default),
            }
        };
        let aspect_ratio = match lookup_option(options, OPT_ASPECT_RATIO) {
            Some(_) => Some(number(OPT_ASPECT_RATIO, 1.6)?).filter(|ratio| *ratio > 0.0),
            None => None,
        };
        Ok(Self {
            direction,
            node_node: number(OPT_NODE_NODE, 20.0)?,
            between_layers: number(OPT_BETWEEN_LAYERS, 20.0)?,
            component: number(OPT_COMPONENT, 20.0)?,
            aspect_ratio,
            padding: node_padding(options)?,
        })
    }
}

fn node_padding(options: &BTreeMap<String, String>) -> Result<Padding, SolverError> {
    match lookup_option(options, OPT_PADDING) {
        Some(raw) => Padding::parse(raw)
            .ok_or_else(|| SolverError::Rejected(format!("malformed padding {raw}"))),
        None => Ok(Padding::uniform(SOLVER_DEFAULT_PADDING)),
    }
}

fn dagre_rankdir(direction: Direction) -> &'static str {
    match direction {
        Direction::Down => "tb",
        Direction::Up => "bt",
        Direction::Right => "lr",
        Direction::Left => "rl",
    }
}

struct Slot {
    id: String,
    parent: Option<usize>,
    children: Vec<usize>,
    size: (f64, f64),
    padding: Padding,
    ports: HashSet<String>,
}

/// Flattened view of the nested solver graph.
struct Arena {
    slots: Vec<Slot>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
    /// Edges lifted to the level where both ends are siblings, keyed by
    /// containing slot (`None` for the root).
    level_edges: HashMap<Option<usize>, Vec<(usize, usize)>>,
}

impl Arena {
    fn build(graph: &SolverGraph) -> Result<Self, SolverError> {
        let mut arena = Arena {
            slots: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            level_edges: HashMap::new(),
        };
        for child in &graph.children {
            let slot = arena.push(child, None)?;
            arena.roots.push(slot);
        }

        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for edge in &graph.edges {
            let source = arena.endpoint(edge, &edge.source, edge.source_port.as_deref())?;
            let target = arena.endpoint(edge, &edge.target, edge.target_port.as_deref())?;
            let source_path = arena.path(source);
            let target_path = arena.path(target);
            let shared = source_path
                .iter()
                .zip(&target_path)
                .take_while(|(a, b)| a == b)
                .count();
            // Self loops and edges into an ancestor carry no ordering at any level.
            if shared == source_path.len() || shared == target_path.len() {
                continue;
            }
            let container = shared.checked_sub(1).map(|idx| source_path[idx]);
            let pair = (source_path[shared], target_path[shared]);
            if seen.insert(pair) {
                arena.level_edges.entry(container).or_default().push(pair);
            }
        }
        Ok(arena)
    }

    fn push(&mut self, node: &SolverNode, parent: Option<usize>) -> Result<usize, SolverError> {
        if self.index.contains_key(&node.id) {
            return Err(SolverError::DuplicateNode(node.id.clone()));
        }
        let padding = if node.children.is_empty() {
            Padding::uniform(0.0)
        } else {
            node_padding(&node.layout_options)?
        };
        let slot = self.slots.len();
        self.slots.push(Slot {
            id: node.id.clone(),
            parent,
            children: Vec::new(),
            size: (
                node.width.unwrap_or(0.0).max(0.0),
                node.height.unwrap_or(0.0).max(0.0),
            ),
            padding,
            ports: node.ports.iter().map(|port| port.id.clone()).collect(),
        });
        self.index.insert(node.id.clone(), slot);
        for child in &node.children {
            let child_slot = self.push(child, Some(slot))?;
            self.slots[slot].children.push(child_slot);
        }
        Ok(slot)
    }

    fn endpoint(
        &self,
        edge: &SolverEdge,
        node: &str,
        port: Option<&str>,
    ) -> Result<usize, SolverError> {
        let slot = self
            .index
            .get(node)
            .copied()
            .ok_or_else(|| SolverError::UnknownEndpoint {
                edge: edge.id.clone(),
                node: node.to_string(),
            })?;
        if let Some(port) = port {
            if !self.slots[slot].ports.contains(port) {
                return Err(SolverError::UnknownEndpoint {
                    edge: edge.id.clone(),
                    node: format!("{node}:{port}"),
                });
            }
        }
        Ok(slot)
    }

    /// Containment path from the top level down to `slot`, inclusive.
    fn path(&self, slot: usize) -> Vec<usize> {
        let mut path = vec![slot];
        let mut current = slot;
        while let Some(parent) = self.slots[current].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    fn level_children(&self, container: Option<usize>) -> &[usize] {
        match container {
            Some(slot) => &self.slots[slot].children,
            None => &self.roots,
        }
    }
}

/// Positions relative to the owning container, filled bottom-up.
struct Placement {
    positions: Vec<(f64, f64)>,
    sizes: Vec<(f64, f64)>,
}

fn solve_layered(mut graph: SolverGraph) -> Result<SolverGraph, SolverError> {
    let settings = LayeredSettings::from_options(&graph.layout_options)?;
    let arena = Arena::build(&graph)?;
    let mut placement = Placement {
        positions: vec![(0.0, 0.0); arena.slots.len()],
        sizes: arena.slots.iter().map(|slot| slot.size).collect(),
    };

    let (content_width, content_height) = layout_level(&arena, None, &settings, &mut placement);
    for slot in &arena.roots {
        let (x, y) = placement.positions[*slot];
        placement.positions[*slot] = (x + settings.padding.left, y + settings.padding.top);
    }
    graph.width = content_width + settings.padding.horizontal();
    graph.height = content_height + settings.padding.vertical();

    for child in &mut graph.children {
        write_back(child, &arena, &placement);
    }
    Ok(graph)
}

fn write_back(node: &mut SolverNode, arena: &Arena, placement: &Placement) {
    if let Some(slot) = arena.index.get(&node.id).copied() {
        let (x, y) = placement.positions[slot];
        let (width, height) = placement.sizes[slot];
        node.x = x;
        node.y = y;
        node.width = Some(width);
        node.height = Some(height);
    }
    for child in &mut node.children {
        write_back(child, arena, placement);
    }
}

/// Lays out the children of `container` and returns the content extent.
fn layout_level(
    arena: &Arena,
    container: Option<usize>,
    settings: &LayeredSettings,
    placement: &mut Placement,
) -> (f64, f64) {
    let members = arena.level_children(container).to_vec();
    for slot in &members {
        if arena.slots[*slot].children.is_empty() {
            continue;
        }
        let (width, height) = layout_level(arena, Some(*slot), settings, placement);
        let padding = arena.slots[*slot].padding;
        for child in &arena.slots[*slot].children {
            let (x, y) = placement.positions[*child];
            placement.positions[*child] = (x + padding.left, y + padding.top);
        }
        placement.sizes[*slot] = (
            width + padding.horizontal(),
            height + padding.vertical(),
        );
    }
    if members.is_empty() {
        return (0.0, 0.0);
    }

    let edges = arena
        .level_edges
        .get(&container)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    match settings.aspect_ratio.filter(|_| container.is_none()) {
        Some(aspect_ratio) => {
            let components = connected_components(&members, edges);
            if components.len() > 1 {
                return pack_components(arena, &components, edges, settings, aspect_ratio, placement);
            }
            run_dagre(arena, &members, edges, settings, placement)
        }
        None => run_dagre(arena, &members, edges, settings, placement),
    }
}

/// Runs dagre over one level and stores top-left positions normalized to the origin.
fn run_dagre(
    arena: &Arena,
    members: &[usize],
    edges: &[(usize, usize)],
    settings: &LayeredSettings,
    placement: &mut Placement,
) -> (f64, f64) {
    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(settings.direction).to_string());
    graph_config.nodesep = Some(settings.node_node as f32);
    graph_config.ranksep = Some(settings.between_layers as f32);
    graph_config.marginx = Some(0.0);
    graph_config.marginy = Some(0.0);
    // The network simplex ranker of dagre_rust 0.0.5 never updates ranks after
    // an exchange and can pivot forever on dense graphs.
    graph_config.ranker = Some("tight-tree".to_string());
    dagre_graph.set_graph(graph_config);

    for (order, slot) in members.iter().enumerate() {
        let (width, height) = placement.sizes[*slot];
        let mut node = DagreNode::default();
        node.width = width as f32;
        node.height = height as f32;
        node.order = Some(order);
        dagre_graph.set_node(arena.slots[*slot].id.clone(), Some(node));
    }
    for (source, target) in acyclic_edges(members, edges) {
        let mut edge_label = DagreEdge::default();
        edge_label.minlen = Some(1.0);
        edge_label.weight = Some(1.0);
        let _ = dagre_graph.set_edge(
            &arena.slots[source].id,
            &arena.slots[target].id,
            Some(edge_label),
            None,
        );
    }

    dagre_layout::run_layout(&mut dagre_graph);

    let mut boxes = Vec::with_capacity(members.len());
    for slot in members {
        let (width, height) = placement.sizes[*slot];
        let (x, y) = match dagre_graph.node(&arena.slots[*slot].id) {
            Some(node) => (
                node.x as f64 - width / 2.0,
                node.y as f64 - height / 2.0,
            ),
            None => (0.0, 0.0),
        };
        boxes.push((*slot, x, y, width, height));
    }
    normalize(&boxes, placement)
}

/// Edges of one level with every cycle broken.
///
/// A depth-first pass in member order reverses back edges. Self loops and
/// pairs that already exist in either direction are dropped, so dagre only
/// ever sees a simple DAG.
fn acyclic_edges(members: &[usize], edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let member_set: HashSet<usize> = members.iter().copied().collect();
    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut kept: HashSet<(usize, usize)> = HashSet::new();
    for (source, target) in edges {
        if source == target || !member_set.contains(source) || !member_set.contains(target) {
            continue;
        }
        if kept.contains(&(*source, *target)) || kept.contains(&(*target, *source)) {
            continue;
        }
        kept.insert((*source, *target));
        adjacency.entry(*source).or_default().push(*target);
    }

    let mut back_edges: HashSet<(usize, usize)> = HashSet::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut on_stack: HashSet<usize> = HashSet::new();
    for start in members {
        if !visited.insert(*start) {
            continue;
        }
        on_stack.insert(*start);
        let mut stack: Vec<(usize, usize)> = vec![(*start, 0)];
        while let Some((node, next)) = stack.last().copied() {
            let targets = adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            let Some(target) = targets.get(next).copied() else {
                on_stack.remove(&node);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            if on_stack.contains(&target) {
                back_edges.insert((node, target));
            } else if visited.insert(target) {
                on_stack.insert(target);
                stack.push((target, 0));
            }
        }
    }

    let mut out = Vec::with_capacity(kept.len());
    let mut emitted: HashSet<(usize, usize)> = HashSet::new();
    for (source, target) in edges {
        if !kept.contains(&(*source, *target)) {
            continue;
        }
        let pair = if back_edges.contains(&(*source, *target)) {
            (*target, *source)
        } else {
            (*source, *target)
        };
        if emitted.insert(pair) {
            out.push(pair);
        }
    }
    out
}

fn normalize(boxes: &[(usize, f64, f64, f64, f64)], placement: &mut Placement) -> (f64, f64) {
    let min_x = boxes.iter().map(|b| b.1).fold(f64::INFINITY, f64::min);
    let min_y = boxes.iter().map(|b| b.2).fold(f64::INFINITY, f64::min);
    let mut max_x: f64 = 0.0;
    let mut max_y: f64 = 0.0;
    for (slot, x, y, width, height) in boxes {
        let local = (x - min_x, y - min_y);
        placement.positions[*slot] = local;
        max_x = max_x.max(local.0 + width);
        max_y = max_y.max(local.1 + height);
    }
    (max_x, max_y)
}

fn connected_components(members: &[usize], edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let position: HashMap<usize, usize> = members
        .iter()
        .enumerate()
        .map(|(idx, slot)| (*slot, idx))
        .collect();
    let mut parent: Vec<usize> = (0..members.len()).collect();
    fn find(parent: &mut [usize], mut idx: usize) -> usize {
        while parent[idx] != idx {
            parent[idx] = parent[parent[idx]];
            idx = parent[idx];
        }
        idx
    }
    for (source, target) in edges {
        let (Some(a), Some(b)) = (position.get(source), position.get(target)) else {
            continue;
        };
        let (ra, rb) = (find(&mut parent, *a), find(&mut parent, *b));
        if ra != rb {
            parent[ra.max(rb)] = ra.min(rb);
        }
    }
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for (idx, slot) in members.iter().enumerate() {
        let root = find(&mut parent, idx);
        match groups.iter_mut().find(|(key, _)| *key == root) {
            Some((_, group)) => group.push(*slot),
            None => groups.push((root, vec![*slot])),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

/// Lays out each component on its own, then packs them into rows whose
/// width follows the requested aspect ratio.
fn pack_components(
    arena: &Arena,
    components: &[Vec<usize>],
    edges: &[(usize, usize)],
    settings: &LayeredSettings,
    aspect_ratio: f64,
    placement: &mut Placement,
) -> (f64, f64) {
    let spacing = settings.component;
    let extents: Vec<(f64, f64)> = components
        .iter()
        .map(|members| run_dagre(arena, members, edges, settings, placement))
        .collect();

    let area: f64 = extents
        .iter()
        .map(|(width, height)| (width + spacing) * (height + spacing))
        .sum();
    let widest = extents.iter().map(|(width, _)| *width).fold(0.0, f64::max);
    let row_limit = widest.max(area.sqrt() * aspect_ratio);

    let (mut cursor_x, mut cursor_y, mut row_height) = (0.0_f64, 0.0_f64, 0.0_f64);
    let (mut max_x, mut max_y) = (0.0_f64, 0.0_f64);
    for (members, (width, height)) in components.iter().zip(&extents) {
        if cursor_x > 0.0 && cursor_x + width > row_limit {
            cursor_x = 0.0;
            cursor_y += row_height + spacing;
            row_height = 0.0;
        }
        for slot in members {
            let (x, y) = placement.positions[*slot];
            placement.positions[*slot] = (x + cursor_x, y + cursor_y);
        }
        max_x = max_x.max(cursor_x + width);
        max_y = max_y.max(cursor_y + height);
        row_height = row_height.max(*height);
        cursor_x += width + spacing;
    }
    (max_x, max_y)
}
