//! Visual edge state derived from the edge type and the display toggles.

use crate::ir::GraphEdge;
use crate::theme::EdgeTheme;
use serde::{Deserialize, Serialize};

/// Edge type tag the flat topology assigns to every edge.
pub const RES_RES_TAG: &str = "other-res-res";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IamDisplay {
    #[default]
    #[serde(rename = "res-res")]
    ResRes,
    #[serde(rename = "res-role")]
    ResRole,
    #[serde(rename = "off")]
    Off,
}

impl IamDisplay {
    pub fn token(self) -> &'static str {
        match self {
            IamDisplay::ResRes => "res-res",
            IamDisplay::ResRole => "res-role",
            IamDisplay::Off => "off",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "res-res" => Some(IamDisplay::ResRes),
            "res-role" => Some(IamDisplay::ResRole),
            "off" => Some(IamDisplay::Off),
            _ => None,
        }
    }
}

/// Which variant of a graph is on screen: nested containers, or one flat
/// level of resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphTopology {
    #[default]
    #[serde(rename = "simplified")]
    Hierarchical,
    #[serde(rename = "complete")]
    Flat,
}

impl GraphTopology {
    pub fn variant(self) -> &'static str {
        match self {
            GraphTopology::Hierarchical => "simplified",
            GraphTopology::Flat => "complete",
        }
    }

    pub fn from_variant(variant: &str) -> Option<Self> {
        match variant {
            "simplified" => Some(GraphTopology::Hierarchical),
            "complete" => Some(GraphTopology::Flat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// IAM relation; the tag lists the display modes it belongs to.
    Iam(String),
    Equality,
    ResourceToResource,
    Other(String),
    Untyped,
}

impl EdgeKind {
    pub fn parse(tag: Option<&str>) -> Self {
        match tag {
            None => EdgeKind::Untyped,
            Some("equality") => EdgeKind::Equality,
            Some(tag) if tag.contains("iam") => EdgeKind::Iam(tag.to_string()),
            Some(RES_RES_TAG) => EdgeKind::ResourceToResource,
            Some(other) => EdgeKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeContext<'a> {
    pub kind: Option<&'a str>,
    pub iam_display: IamDisplay,
    /// An endpoint is the hovered or the selected node.
    pub emphasized: bool,
    pub show_labels: bool,
    pub topology: GraphTopology,
    pub json_path: Option<&'a str>,
}

impl<'a> EdgeContext<'a> {
    pub fn for_edge(
        edge: &'a GraphEdge,
        selected: Option<&str>,
        hovered: Option<&str>,
        iam_display: IamDisplay,
        show_labels: bool,
        topology: GraphTopology,
    ) -> Self {
        let touches = |id: Option<&str>| {
            id.is_some_and(|id| edge.source == id || edge.target == id)
        };
        Self {
            kind: edge.kind(),
            iam_display,
            emphasized: touches(selected) || touches(hovered),
            show_labels,
            topology,
            json_path: edge.json_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    #[serde(rename = "arrowclosed")]
    ArrowClosed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub color: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLabel {
    pub text: Option<String>,
    pub font_size: f64,
    pub fill: String,
    pub bg_fill: String,
    pub bg_padding: [f64; 2],
    pub bg_border_radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDecoration {
    #[serde(default)]
    pub animated: bool,
    /// `None` leaves the edge's own visibility untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_end: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<EdgeLabel>,
}

pub fn decorate_edge(context: &EdgeContext<'_>, theme: &EdgeTheme) -> EdgeDecoration {
    let kind = match context.topology {
        GraphTopology::Flat => EdgeKind::ResourceToResource,
        GraphTopology::Hierarchical => EdgeKind::parse(context.kind),
    };
    let coeff = if context.emphasized { theme.coeff_hover } else { 1.0 };
    let pick = |normal: &str, emphasized: &str| -> String {
        let chosen = if context.emphasized { emphasized } else { normal };
        chosen.to_string()
    };
    let arrow = |color: String| Marker {
        kind: MarkerKind::ArrowClosed,
        color,
        width: theme.arrow_size,
        height: theme.arrow_size,
    };

    let mut decoration = EdgeDecoration::default();
    match &kind {
        EdgeKind::Equality => {
            decoration.animated = true;
            // Emphasis uses the lighter base stroke and rest uses the darker one.
            decoration.style = Some(EdgeStyle {
                stroke: pick(&theme.stroke_hovered_sel.equality, &theme.stroke.equality),
                stroke_width: coeff * theme.stroke_width.equality,
            });
        }
        EdgeKind::Iam(tag) => {
            let shown = context.iam_display != IamDisplay::Off
                && tag.contains(context.iam_display.token());
            if shown {
                let color = pick(&theme.stroke.iam, &theme.stroke_hovered_sel.iam);
                decoration.hidden = Some(false);
                decoration.marker_end = Some(arrow(color.clone()));
                decoration.style = Some(EdgeStyle {
                    stroke: color,
                    stroke_width: coeff * theme.stroke_width.iam,
                });
            } else {
                decoration.hidden = Some(true);
            }
        }
        EdgeKind::ResourceToResource => {
            let color = pick(&theme.stroke.r2r, &theme.stroke_hovered_sel.r2r);
            decoration.marker_end = Some(arrow(color.clone()));
            decoration.style = Some(EdgeStyle {
                stroke: color,
                stroke_width: coeff * theme.stroke_width.r2r,
            });
        }
        EdgeKind::Other(_) | EdgeKind::Untyped => {}
    }

    let labelled = kind == EdgeKind::ResourceToResource || context.topology == GraphTopology::Flat;
    if context.show_labels && labelled {
        decoration.label = Some(EdgeLabel {
            text: context.json_path.map(str::to_string),
            font_size: theme.label_font_size,
            fill: theme.label_fill.clone(),
            bg_fill: "transparent".to_string(),
            bg_padding: [0.0, 0.0],
            bg_border_radius: 0.0,
        });
    }
    decoration
}
