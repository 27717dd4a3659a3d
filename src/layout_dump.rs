use crate::decoration::EdgeDecoration;
use crate::ir::Position;
use crate::scan::ResourceErrors;
use crate::state::ViewState;
use crate::theme::EdgeTheme;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub topology: String,
    pub iam_display: String,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub parent_id: Option<String>,
    pub kind: Option<String>,
    /// Relative to the parent, as stored on the node.
    pub position: Position,
    pub absolute: Position,
    pub width: f64,
    pub height: f64,
    pub hidden: bool,
    pub failed_checks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub kind: Option<String>,
    pub decoration: EdgeDecoration,
}

impl LayoutDump {
    pub fn from_state(state: &ViewState, theme: &EdgeTheme, findings: &ResourceErrors) -> Self {
        let graph = state.laid_out();
        let absolute = graph.absolute_positions();

        let mut width: f64 = 0.0;
        let mut height: f64 = 0.0;
        let nodes = graph
            .nodes
            .iter()
            .map(|node| {
                let abs = absolute.get(&node.id).copied().unwrap_or(node.position);
                let node_width = node.width.unwrap_or(0.0);
                let node_height = node.height.unwrap_or(0.0);
                if !node.hidden {
                    width = width.max(abs.x + node_width);
                    height = height.max(abs.y + node_height);
                }
                NodeDump {
                    id: node.id.clone(),
                    parent_id: node.parent_id.clone(),
                    kind: node.kind.clone(),
                    position: node.position,
                    absolute: abs,
                    width: node_width,
                    height: node_height,
                    hidden: node.hidden,
                    failed_checks: findings.failed_count(&node.id),
                }
            })
            .collect();

        let edges = state
            .decorated_edges(theme)
            .into_iter()
            .map(|decorated| EdgeDump {
                id: decorated.edge.layout_id(),
                kind: decorated.edge.kind().map(str::to_string),
                source: decorated.edge.source,
                target: decorated.edge.target,
                source_handle: decorated.edge.source_handle,
                target_handle: decorated.edge.target_handle,
                decoration: decorated.decoration,
            })
            .collect();

        LayoutDump {
            topology: state.topology().variant().to_string(),
            iam_display: state.iam_display().token().to_string(),
            width,
            height,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    state: &ViewState,
    theme: &EdgeTheme,
    findings: &ResourceErrors,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_state(state, theme, findings);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Graph, GraphEdge, GraphNode};

    #[test]
    fn dumps_relative_and_absolute_positions() {
        let mut state = ViewState::default();
        let ticket = state.set_graph(Graph::new(
            vec![
                GraphNode::new("vpc").with_kind("vpc").with_size(300.0, 200.0).at(10.0, 20.0),
                GraphNode::new("db")
                    .with_kind("resource")
                    .with_parent("vpc")
                    .with_size(80.0, 75.0)
                    .at(40.0, 50.0),
            ],
            vec![GraphEdge::new("vpc", "db")],
        ));
        assert!(state.commit_layout(ticket.generation, ticket.graph));

        let findings: ResourceErrors =
            serde_json::from_str(r#"{"db": {"has_issues": true, "failed_count": 2}}"#).unwrap();
        let dump = LayoutDump::from_state(&state, &EdgeTheme::default(), &findings);
        let db = dump.nodes.iter().find(|node| node.id == "db").unwrap();
        assert_eq!(db.position, Position::new(40.0, 50.0));
        assert_eq!(db.absolute, Position::new(50.0, 70.0));
        assert_eq!(db.failed_checks, 2);
        assert_eq!(dump.width, 310.0);
        assert_eq!(dump.height, 220.0);
        assert_eq!(dump.topology, "simplified");
        assert_eq!(dump.edges.len(), 1);
    }
}
