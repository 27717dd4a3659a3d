use cloudviz_layout::config::Config;
use cloudviz_layout::layout::layout_flat_layered;
use cloudviz_layout::{Direction, Graph, GraphTopology, IamDisplay, Size, ViewState, layout_for_topology};
use futures::executor::block_on;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutRequest {
    /// `simplified` or `complete`.
    variant: Option<String>,
    /// `hierarchical` (default) or `layered`.
    mode: Option<String>,
    direction: Option<String>,
    iam_display: Option<IamDisplay>,
    width: Option<f64>,
    height: Option<f64>,
}

fn build_config(request: &LayoutRequest) -> Result<Config, String> {
    let mut config = Config::default();
    if let Some(raw) = request.direction.as_deref() {
        let direction = Direction::from_token(raw).ok_or_else(|| format!("unknown direction {raw:?}"))?;
        config.hierarchical.direction = direction;
        config.flat.direction = direction;
    }
    if let Some(width) = request.width {
        config.viewport.width = width;
    }
    if let Some(height) = request.height {
        config.viewport.height = height;
    }
    Ok(config)
}

fn run_layout(graph_json: &str, request: LayoutRequest) -> Result<String, String> {
    let graph: Graph = serde_json::from_str(graph_json).map_err(|error| error.to_string())?;
    let config = build_config(&request)?;
    let topology = request
        .variant
        .as_deref()
        .and_then(GraphTopology::from_variant)
        .unwrap_or_default();

    let mut state = ViewState::new(request.iam_display.unwrap_or_default(), topology);
    let ticket = state.set_graph(graph);
    let viewport = config.viewport.viewport();
    let laid_out = block_on(async {
        match request.mode.as_deref() {
            Some("layered") => layout_flat_layered(
                &ticket.graph.nodes,
                &ticket.graph.edges,
                &viewport,
                &config.flat.options(),
            )
            .await
            .map(|nodes| Graph::new(nodes, ticket.graph.edges.clone())),
            _ => {
                let size = Size::new(viewport.width, viewport.height);
                layout_for_topology(&ticket.graph, ticket.topology, &config, Some(size)).await
            }
        }
    })
    .map_err(|error| error.to_string())?;
    state.commit_layout(ticket.generation, laid_out);
    serde_json::to_string(state.laid_out()).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_graph(graph_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let request = if let Some(raw_options) = options_json {
        serde_json::from_str::<LayoutRequest>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        LayoutRequest::default()
    };

    run_layout(graph_json, request).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{LayoutRequest, run_layout};
    use cloudviz_layout::Graph;

    #[test]
    fn lays_out_a_nested_graph() {
        let graph = r#"{
            "nodes": [
                {"id": "vpc", "type": "vpc"},
                {"id": "a", "type": "resource", "parentId": "vpc"},
                {"id": "b", "type": "resource", "parentId": "vpc"}
            ],
            "edges": [{"source": "a", "target": "b", "data": {"type": "other-res-res"}}]
        }"#;

        let out = run_layout(graph, LayoutRequest::default()).expect("nested graph should lay out");
        let graph: Graph = serde_json::from_str(&out).unwrap();
        let vpc = graph.node("vpc").unwrap();
        assert!(vpc.width.unwrap() > 80.0);
        assert_eq!(graph.node("a").unwrap().extent.as_deref(), Some("parent"));
    }

    #[test]
    fn rejects_unknown_direction() {
        let request = LayoutRequest {
            direction: Some("sideways".into()),
            ..LayoutRequest::default()
        };
        assert!(run_layout(r#"{"nodes": [], "edges": []}"#, request).is_err());
    }
}
