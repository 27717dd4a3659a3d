use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, other: Position) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn distance(self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Principal flow axis of the layered engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Down,
    Up,
    Left,
    Right,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "DOWN" | "TB" | "TD" => Some(Self::Down),
            "UP" | "BT" => Some(Self::Up),
            "LEFT" | "RL" => Some(Self::Left),
            "RIGHT" | "LR" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Direction::Down => "DOWN",
            Direction::Up => "UP",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

/// Renderer tag carried in a node's `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Resource,
    Iam,
    Vpc,
    Subnet,
    AwsContainer,
    ServiceContainer,
    /// No tag, or the canvas' built-in `default` node.
    Default,
    Unknown(String),
}

impl NodeKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None | Some("default") => NodeKind::Default,
            Some("resource") => NodeKind::Resource,
            Some("iam") => NodeKind::Iam,
            Some("vpc") => NodeKind::Vpc,
            Some("subnet") => NodeKind::Subnet,
            Some("aws_container") => NodeKind::AwsContainer,
            Some("service_container") => NodeKind::ServiceContainer,
            Some(other) => NodeKind::Unknown(other.to_string()),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Vpc | NodeKind::Subnet | NodeKind::AwsContainer | NodeKind::ServiceContainer
        )
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub position: Position,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            hidden: false,
            width: None,
            height: None,
            position: Position::default(),
            kind: None,
            extent: None,
            style: None,
            data: Value::Null,
            extra: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn node_kind(&self) -> NodeKind {
        NodeKind::from_tag(self.kind.as_deref())
    }

    /// Human readable name: `data.resource_name`, then `data.label`, then the id.
    pub fn display_name(&self) -> &str {
        ["resource_name", "label"]
            .iter()
            .find_map(|key| self.data.get(*key).and_then(Value::as_str))
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            hidden: false,
            data: None,
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.data.get_or_insert_with(EdgeData::default).kind = Some(kind.into());
        self
    }

    pub fn with_handles(mut self, source: Option<&str>, target: Option<&str>) -> Self {
        self.source_handle = source.map(str::to_string);
        self.target_handle = target.map(str::to_string);
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.kind.as_deref())
    }

    pub fn json_path(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.json_path.as_deref())
    }

    /// Stable id used by the solvers when the payload carries none.
    pub fn layout_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.source, self.target))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Absolute top-left of every node, accumulating parent frames.
    ///
    /// A parent that is missing or hidden ends the chain: such nodes are laid out
    /// in the root frame. So does a node that breaks a parent cycle, matching how
    /// the hierarchical engine places it.
    pub fn absolute_positions(&self) -> HashMap<String, Position> {
        let mut by_id: HashMap<&str, &GraphNode> = HashMap::new();
        for node in self.nodes.iter().filter(|node| !node.hidden) {
            by_id.entry(node.id.as_str()).or_insert(node);
        }
        let breaks = cycle_breaks(&self.nodes);
        let mut out = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut absolute = node.position;
            let mut current = node;
            while !breaks.contains(current.id.as_str()) {
                let Some(parent) = current
                    .parent_id
                    .as_deref()
                    .filter(|parent| *parent != current.id)
                    .and_then(|parent| by_id.get(parent).copied())
                else {
                    break;
                };
                absolute = absolute.offset(parent.position);
                current = parent;
            }
            out.entry(node.id.clone()).or_insert(absolute);
        }
        out
    }
}

/// Visible nodes whose parent chain never reaches the root frame.
///
/// Walking them in declaration order, each one not yet reached starts a frame of
/// its own and takes its descendants along, so every parent cycle is cut once.
fn cycle_breaks(nodes: &[GraphNode]) -> HashSet<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let visible: Vec<&GraphNode> = nodes
        .iter()
        .filter(|node| !node.hidden && seen.insert(node.id.as_str()))
        .collect();

    let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut roots: Vec<&str> = Vec::new();
    for node in &visible {
        match node
            .parent_id
            .as_deref()
            .filter(|parent| *parent != node.id && seen.contains(parent))
        {
            Some(parent) => children_of.entry(parent).or_default().push(node.id.as_str()),
            None => roots.push(node.id.as_str()),
        }
    }

    let mut reached: HashSet<&str> = HashSet::new();
    for root in roots {
        reach(root, &children_of, &mut reached);
    }
    let mut breaks = HashSet::new();
    for node in visible {
        if !reached.contains(node.id.as_str()) {
            breaks.insert(node.id.as_str());
            reach(node.id.as_str(), &children_of, &mut reached);
        }
    }
    breaks
}

fn reach<'a>(
    start: &'a str,
    children_of: &HashMap<&'a str, Vec<&'a str>>,
    reached: &mut HashSet<&'a str>,
) {
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if reached.insert(id)
            && let Some(children) = children_of.get(id)
        {
            stack.extend(children.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canvas_payload() {
        let raw = r#"{
            "nodes": [
                {"id": "vpc", "type": "vpc", "position": {"x": 0, "y": 0}, "data": {"label": "main"}},
                {"id": "db", "parentId": "vpc", "type": "resource", "width": 80, "height": 75,
                 "data": {"resource_name": "orders"}, "draggable": false}
            ],
            "edges": [
                {"id": "e1", "source": "db", "target": "vpc", "sourceHandle": null,
                 "data": {"type": "equality", "json_path": "a.b"}}
            ]
        }"#;
        let graph: Graph = serde_json::from_str(raw).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        let db = &graph.nodes[1];
        assert_eq!(db.parent_id.as_deref(), Some("vpc"));
        assert_eq!(db.node_kind(), NodeKind::Resource);
        assert_eq!(db.display_name(), "orders");
        assert_eq!(db.extra.get("draggable"), Some(&Value::Bool(false)));
        assert_eq!(graph.edges[0].kind(), Some("equality"));
        assert_eq!(graph.edges[0].json_path(), Some("a.b"));
        assert_eq!(graph.edges[0].source_handle, None);

        let back = serde_json::to_value(&graph).unwrap();
        assert_eq!(back["nodes"][1]["parentId"], "vpc");
        assert_eq!(back["nodes"][1]["draggable"], false);
    }

    #[test]
    fn absolute_positions_follow_visible_parents() {
        let graph = Graph::new(
            vec![
                GraphNode::new("vpc").at(100.0, 50.0),
                GraphNode::new("subnet").with_parent("vpc").at(10.0, 20.0),
                GraphNode::new("vm").with_parent("subnet").at(5.0, 5.0),
                GraphNode::new("hidden").at(999.0, 999.0).hidden(),
                GraphNode::new("orphan").with_parent("hidden").at(1.0, 2.0),
            ],
            Vec::new(),
        );
        let abs = graph.absolute_positions();
        assert_eq!(abs["vm"], Position::new(115.0, 75.0));
        assert_eq!(abs["orphan"], Position::new(1.0, 2.0));
    }

    #[test]
    fn absolute_positions_stop_on_cycles() {
        let graph = Graph::new(
            vec![
                GraphNode::new("a").with_parent("b").at(1.0, 1.0),
                GraphNode::new("b").with_parent("a").at(2.0, 2.0),
            ],
            Vec::new(),
        );
        let abs = graph.absolute_positions();
        assert_eq!(abs["a"], Position::new(1.0, 1.0));
        assert_eq!(abs["b"], Position::new(3.0, 3.0));
    }

    #[test]
    fn first_declared_node_breaks_a_parent_cycle() {
        let graph = Graph::new(
            vec![
                GraphNode::new("a").with_parent("b").at(1.0, 1.0),
                GraphNode::new("b").with_parent("a").at(2.0, 2.0),
                GraphNode::new("c").with_parent("b").at(10.0, 10.0),
                GraphNode::new("d").with_parent("d").at(5.0, 5.0),
            ],
            Vec::new(),
        );
        let abs = graph.absolute_positions();
        assert_eq!(abs["c"], Position::new(13.0, 13.0));
        assert_eq!(abs["d"], Position::new(5.0, 5.0));

        let graph = Graph::new(
            vec![
                GraphNode::new("c").with_parent("b").at(10.0, 10.0),
                GraphNode::new("a").with_parent("b").at(1.0, 1.0),
                GraphNode::new("b").with_parent("a").at(2.0, 2.0),
            ],
            Vec::new(),
        );
        let abs = graph.absolute_positions();
        assert_eq!(abs["c"], Position::new(10.0, 10.0));
        assert_eq!(abs["a"], Position::new(1.0, 1.0));
        assert_eq!(abs["b"], Position::new(3.0, 3.0));
    }

    #[test]
    fn direction_tokens() {
        assert_eq!(Direction::from_token("lr"), Some(Direction::Right));
        assert_eq!(Direction::from_token("DOWN"), Some(Direction::Down));
        assert_eq!(Direction::from_token("sideways"), None);
        assert_eq!(Direction::Left.as_token(), "LEFT");
    }
}
