//! Connection handles: measured anchor geometry, closest-pair assignment and
//! the port hints the layered engine registers before a solve.

use crate::ir::{Direction, GraphEdge, GraphNode, NodeKind, Position, Size};
use crate::layout::PortSide;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Edge length of the square box every rendered handle occupies.
pub const HANDLE_SIZE: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleBounds {
    pub id: Option<String>,
    pub position: PortSide,
    /// Offset of the box from the node's top-left.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl HandleBounds {
    fn centred(id: Option<&str>, side: PortSide, size: Size) -> Self {
        let half = HANDLE_SIZE / 2.0;
        let (cx, cy) = match side {
            PortSide::Top => (size.width / 2.0, 0.0),
            PortSide::Right => (size.width, size.height / 2.0),
            PortSide::Bottom => (size.width / 2.0, size.height),
            PortSide::Left => (0.0, size.height / 2.0),
        };
        Self {
            id: id.map(str::to_string),
            position: side,
            x: cx - half,
            y: cy - half,
            width: HANDLE_SIZE,
            height: HANDLE_SIZE,
        }
    }

    fn centre(&self, origin: Position) -> Position {
        Position::new(
            origin.x + self.x + self.width / 2.0,
            origin.y + self.y + self.height / 2.0,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandleSet {
    pub source: Vec<HandleBounds>,
    pub target: Vec<HandleBounds>,
}

/// What the canvas knows about a rendered node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternals {
    pub position_absolute: Position,
    /// `None` until the node has been measured.
    pub handle_bounds: Option<HandleSet>,
}

/// Outcome of [`assign_closest_handles`].
///
/// The outer `None` leaves the edge on the node's default anchor. `Some(None)`
/// names an anchor that has no id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleAssignment {
    pub source_handle: Option<Option<String>>,
    pub target_handle: Option<Option<String>>,
}

const SOURCE_ORDER: [PortSide; 4] = [PortSide::Top, PortSide::Right, PortSide::Bottom, PortSide::Left];
const TARGET_ORDER: [PortSide; 4] = [PortSide::Bottom, PortSide::Left, PortSide::Top, PortSide::Right];

/// Anchor geometry a node renders with, by node kind.
///
/// Resources and IAM roles expose `top`/`right`/`bottom`/`left` in both roles;
/// the untyped default node has one anonymous anchor per role; containers have
/// none.
pub fn handle_set_for(kind: &NodeKind, size: Size) -> HandleSet {
    match kind {
        NodeKind::Resource | NodeKind::Iam => HandleSet {
            source: SOURCE_ORDER
                .iter()
                .map(|side| HandleBounds::centred(Some(side_id(*side)), *side, size))
                .collect(),
            target: TARGET_ORDER
                .iter()
                .map(|side| HandleBounds::centred(Some(side_id(*side)), *side, size))
                .collect(),
        },
        NodeKind::Default => HandleSet {
            source: vec![HandleBounds::centred(None, PortSide::Bottom, size)],
            target: vec![HandleBounds::centred(None, PortSide::Top, size)],
        },
        _ => HandleSet::default(),
    }
}

fn side_id(side: PortSide) -> &'static str {
    match side {
        PortSide::Top => "top",
        PortSide::Right => "right",
        PortSide::Bottom => "bottom",
        PortSide::Left => "left",
    }
}

/// Internals for every visible node of a laid-out graph.
pub fn measure_graph(nodes: &[GraphNode], absolute: &BTreeMap<String, Position>) -> BTreeMap<String, NodeInternals> {
    nodes
        .iter()
        .filter(|node| !node.hidden)
        .map(|node| {
            let size = Size::new(node.width.unwrap_or(0.0), node.height.unwrap_or(0.0));
            let internals = NodeInternals {
                position_absolute: absolute.get(&node.id).copied().unwrap_or(node.position),
                handle_bounds: Some(handle_set_for(&node.node_kind(), size)),
            };
            (node.id.clone(), internals)
        })
        .collect()
}

fn anchor_points(internals: &NodeInternals, source_role: bool) -> Vec<(Option<&str>, Position)> {
    let Some(bounds) = internals.handle_bounds.as_ref() else {
        return Vec::new();
    };
    let list = if source_role { &bounds.source } else { &bounds.target };
    list.iter()
        .map(|handle| (handle.id.as_deref(), handle.centre(internals.position_absolute)))
        .collect()
}

fn distance_squared(a: Position, b: Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Picks the source/target anchor pair with the smallest centre distance.
///
/// Candidates are scanned source-major in declaration order and only a
/// strictly smaller distance replaces the best pair, so ties go to the first.
pub fn assign_closest_handles(source: &NodeInternals, target: &NodeInternals) -> HandleAssignment {
    let sources = anchor_points(source, true);
    let targets = anchor_points(target, false);
    if sources.is_empty() || targets.is_empty() {
        return HandleAssignment::default();
    }

    let mut best: Option<(Option<&str>, Option<&str>, f64)> = None;
    for (source_id, source_point) in &sources {
        for (target_id, target_point) in &targets {
            let d2 = distance_squared(*source_point, *target_point);
            if best.is_none_or(|(_, _, current)| d2 < current) {
                best = Some((*source_id, *target_id, d2));
            }
        }
    }

    match best {
        Some((source_id, target_id, _)) => HandleAssignment {
            source_handle: Some(source_id.map(str::to_string)),
            target_handle: Some(target_id.map(str::to_string)),
        },
        None => HandleAssignment::default(),
    }
}

/// Side a port sits on for a given flow direction and edge role.
pub fn port_side(direction: Direction, is_source: bool) -> PortSide {
    match (direction, is_source) {
        (Direction::Right, true) | (Direction::Left, false) => PortSide::Right,
        (Direction::Right, false) | (Direction::Left, true) => PortSide::Left,
        (Direction::Down, true) | (Direction::Up, false) => PortSide::Bottom,
        (Direction::Down, false) | (Direction::Up, true) => PortSide::Top,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortHint {
    pub handle: String,
    pub side: PortSide,
}

/// Ports to register per node, from the handles edges already name.
///
/// A handle is registered once per node, by its first use.
pub fn collect_ports(edges: &[GraphEdge], direction: Direction) -> BTreeMap<String, Vec<PortHint>> {
    let mut by_node: BTreeMap<String, Vec<PortHint>> = BTreeMap::new();
    let mut add = |node: &str, handle: Option<&str>, is_source: bool| {
        let Some(handle) = handle.filter(|handle| !handle.is_empty()) else {
            return;
        };
        let ports = by_node.entry(node.to_string()).or_default();
        if ports.iter().all(|port| port.handle != handle) {
            ports.push(PortHint {
                handle: handle.to_string(),
                side: port_side(direction, is_source),
            });
        }
    };
    for edge in edges {
        add(&edge.source, edge.source_handle.as_deref(), true);
        add(&edge.target, edge.target_handle.as_deref(), false);
    }
    by_node
}
