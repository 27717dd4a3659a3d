use serde::{Deserialize, Serialize};

/// Stroke colour triple, one per decorated edge family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePalette {
    pub iam: String,
    pub r2r: String,
    pub equality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeWidths {
    pub iam: f64,
    pub r2r: f64,
    pub equality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeTheme {
    pub stroke: EdgePalette,
    pub stroke_hovered_sel: EdgePalette,
    pub stroke_width: EdgeWidths,
    pub arrow_size: f64,
    /// Width multiplier for edges touching the hovered or selected node.
    pub coeff_hover: f64,
    pub label_font_size: f64,
    pub label_fill: String,
}

impl Default for EdgeTheme {
    fn default() -> Self {
        Self {
            stroke: EdgePalette {
                iam: "#9ac5e4ff".to_string(),
                r2r: "#f6b93bff".to_string(),
                equality: "#787878ff".to_string(),
            },
            stroke_hovered_sel: EdgePalette {
                iam: "#3a98dbff".to_string(),
                r2r: "#a27313ff".to_string(),
                equality: "#434343ff".to_string(),
            },
            stroke_width: EdgeWidths {
                iam: 1.4,
                r2r: 1.4,
                equality: 1.65,
            },
            arrow_size: 12.0,
            coeff_hover: 1.7,
            label_font_size: 8.0,
            label_fill: "#333".to_string(),
        }
    }
}

/// Colours of the SVG preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_border: String,
    pub iam_fill: String,
    pub container_fill: String,
    pub container_border: String,
    pub text_color: String,
    pub line_color: String,
    pub background: String,
    pub edges: EdgeTheme,
}

impl Theme {
    pub fn cloud() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 10.0,
            node_fill: "#FFFFFF".to_string(),
            node_border: "#C7D2E5".to_string(),
            iam_fill: "#EEF6FC".to_string(),
            container_fill: "#F7FAFF".to_string(),
            container_border: "#7A8AA6".to_string(),
            text_color: "#1C2430".to_string(),
            line_color: "#B1B1B7".to_string(),
            background: "#FFFFFF".to_string(),
            edges: EdgeTheme::default(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::cloud()
    }
}
