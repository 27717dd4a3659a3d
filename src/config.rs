use crate::ir::{Direction, Position, Size};
use crate::layout::{FlatLayeredOptions, ForceOptions, LinkDistance, Padding, Viewport};
use crate::theme::Theme;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchicalConfig {
    pub direction: Direction,
    pub cluster_padding: Padding,
    pub overrides: BTreeMap<String, String>,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Down,
            cluster_padding: Padding::new(38.0, 20.0, 20.0, 20.0),
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceConfig {
    pub charge_strength: f64,
    pub link_distance: f64,
    pub link_strength: f64,
    pub collide_padding: f64,
    pub iterations: usize,
    pub center: Position,
    pub seed: Option<u64>,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            charge_strength: -400.0,
            link_distance: 120.0,
            link_strength: 0.8,
            collide_padding: 12.0,
            iterations: 300,
            center: Position::default(),
            seed: None,
        }
    }
}

impl ForceConfig {
    pub fn options(&self) -> ForceOptions {
        ForceOptions {
            charge_strength: self.charge_strength,
            link_distance: LinkDistance::Constant(self.link_distance),
            link_strength: self.link_strength,
            collide_padding: self.collide_padding,
            iterations: self.iterations,
            center: self.center,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatConfig {
    pub direction: Direction,
    pub node_node_spacing: f64,
    pub edge_node_spacing: f64,
    pub edge_edge_spacing: f64,
    pub overrides: BTreeMap<String, String>,
}

impl Default for FlatConfig {
    fn default() -> Self {
        let defaults = FlatLayeredOptions::default();
        Self {
            direction: defaults.direction,
            node_node_spacing: defaults.node_node_spacing,
            edge_node_spacing: defaults.edge_node_spacing,
            edge_edge_spacing: defaults.edge_edge_spacing,
            overrides: defaults.overrides,
        }
    }
}

impl FlatConfig {
    pub fn options(&self) -> FlatLayeredOptions {
        FlatLayeredOptions {
            direction: self.direction,
            node_node_spacing: self.node_node_spacing,
            edge_node_spacing: self.edge_node_spacing,
            edge_edge_spacing: self.edge_edge_spacing,
            overrides: self.overrides.clone(),
        }
    }
}

/// Default leaf sizes per rendering preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePresets {
    pub resource: Size,
    pub non_hierarchical: Size,
}

impl Default for NodePresets {
    fn default() -> Self {
        Self {
            resource: Size::new(80.0, 75.0),
            non_hierarchical: Size::new(70.0, 70.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            padding: 32.0,
        }
    }
}

impl ViewportConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height).with_padding(self.padding)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub hierarchical: HierarchicalConfig,
    pub force: ForceConfig,
    pub flat: FlatConfig,
    pub presets: NodePresets,
    pub viewport: ViewportConfig,
    pub theme: Theme,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaddingValue {
    Number(f64),
    Text(String),
    Sides(Padding),
}

impl PaddingValue {
    fn to_padding(&self) -> Option<Padding> {
        match self {
            PaddingValue::Number(value) => Some(Padding::uniform(*value)),
            PaddingValue::Text(raw) => Padding::parse(raw),
            PaddingValue::Sides(padding) => Some(*padding),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    node_fill: Option<String>,
    node_border: Option<String>,
    iam_fill: Option<String>,
    container_fill: Option<String>,
    container_border: Option<String>,
    text_color: Option<String>,
    line_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeThemeFile {
    arrow_size: Option<f64>,
    coeff_hover: Option<f64>,
    label_font_size: Option<f64>,
    label_fill: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HierarchicalFile {
    direction: Option<String>,
    cluster_padding: Option<PaddingValue>,
    overrides: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForceFile {
    charge_strength: Option<f64>,
    link_distance: Option<f64>,
    link_strength: Option<f64>,
    collide_padding: Option<f64>,
    iterations: Option<usize>,
    center: Option<Position>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatFile {
    direction: Option<String>,
    node_node_spacing: Option<f64>,
    edge_node_spacing: Option<f64>,
    edge_edge_spacing: Option<f64>,
    overrides: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresetsFile {
    resource: Option<Size>,
    non_hierarchical: Option<Size>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewportFile {
    width: Option<f64>,
    height: Option<f64>,
    padding: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    edges: Option<EdgeThemeFile>,
    hierarchical: Option<HierarchicalFile>,
    force: Option<ForceFile>,
    flat: Option<FlatFile>,
    presets: Option<PresetsFile>,
    viewport: Option<ViewportFile>,
}

fn parse_direction(raw: &str) -> anyhow::Result<Direction> {
    match Direction::from_token(raw) {
        Some(direction) => Ok(direction),
        None => bail!("unknown direction {raw:?}"),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let parsed: ConfigFile = if path.extension().is_some_and(|ext| ext == "json5") {
        json5::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };

    if let Some(theme_name) = parsed.theme.as_deref()
        && (theme_name == "cloud" || theme_name == "default")
    {
        config.theme = Theme::cloud();
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.node_fill {
            config.theme.node_fill = v;
        }
        if let Some(v) = vars.node_border {
            config.theme.node_border = v;
        }
        if let Some(v) = vars.iam_fill {
            config.theme.iam_fill = v;
        }
        if let Some(v) = vars.container_fill {
            config.theme.container_fill = v;
        }
        if let Some(v) = vars.container_border {
            config.theme.container_border = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(edges) = parsed.edges {
        if let Some(v) = edges.arrow_size {
            config.theme.edges.arrow_size = v;
        }
        if let Some(v) = edges.coeff_hover {
            config.theme.edges.coeff_hover = v;
        }
        if let Some(v) = edges.label_font_size {
            config.theme.edges.label_font_size = v;
        }
        if let Some(v) = edges.label_fill {
            config.theme.edges.label_fill = v;
        }
    }

    if let Some(hierarchical) = parsed.hierarchical {
        if let Some(v) = hierarchical.direction.as_deref() {
            config.hierarchical.direction = parse_direction(v)?;
        }
        if let Some(v) = hierarchical.cluster_padding {
            let Some(padding) = v.to_padding() else {
                bail!("malformed cluster padding {v:?}");
            };
            config.hierarchical.cluster_padding = padding;
        }
        if let Some(v) = hierarchical.overrides {
            config.hierarchical.overrides.extend(v);
        }
    }

    if let Some(force) = parsed.force {
        if let Some(v) = force.charge_strength {
            config.force.charge_strength = v;
        }
        if let Some(v) = force.link_distance {
            config.force.link_distance = v;
        }
        if let Some(v) = force.link_strength {
            config.force.link_strength = v;
        }
        if let Some(v) = force.collide_padding {
            config.force.collide_padding = v;
        }
        if let Some(v) = force.iterations {
            config.force.iterations = v;
        }
        if let Some(v) = force.center {
            config.force.center = v;
        }
        if force.seed.is_some() {
            config.force.seed = force.seed;
        }
    }

    if let Some(flat) = parsed.flat {
        if let Some(v) = flat.direction.as_deref() {
            config.flat.direction = parse_direction(v)?;
        }
        if let Some(v) = flat.node_node_spacing {
            config.flat.node_node_spacing = v;
        }
        if let Some(v) = flat.edge_node_spacing {
            config.flat.edge_node_spacing = v;
        }
        if let Some(v) = flat.edge_edge_spacing {
            config.flat.edge_edge_spacing = v;
        }
        if let Some(v) = flat.overrides {
            config.flat.overrides.extend(v);
        }
    }

    if let Some(presets) = parsed.presets {
        if let Some(v) = presets.resource {
            config.presets.resource = v;
        }
        if let Some(v) = presets.non_hierarchical {
            config.presets.non_hierarchical = v;
        }
    }

    if let Some(viewport) = parsed.viewport {
        if let Some(v) = viewport.width {
            config.viewport.width = v;
        }
        if let Some(v) = viewport.height {
            config.viewport.height = v;
        }
        if let Some(v) = viewport.padding {
            config.viewport.padding = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("cloudviz-{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_match_the_presets() {
        let config = load_config(None).unwrap();
        assert_eq!(config.presets.resource, Size::new(80.0, 75.0));
        assert_eq!(config.presets.non_hierarchical, Size::new(70.0, 70.0));
        assert_eq!(
            config.hierarchical.cluster_padding,
            Padding::new(38.0, 20.0, 20.0, 20.0)
        );
        assert_eq!(config.viewport.viewport().padding, 32.0);
        assert_eq!(config.force.options().iterations, 300);
    }

    #[test]
    fn applies_partial_json() {
        let path = write_temp(
            "partial.json",
            r#"{
                "hierarchical": {"direction": "RIGHT", "clusterPadding": "[top=40,left=10,bottom=10,right=10]"},
                "force": {"seed": 9, "linkDistance": 200},
                "viewport": {"width": 1600},
                "presets": {"nonHierarchical": {"width": 90, "height": 60}},
                "edges": {"coeffHover": 2.0}
            }"#,
        );
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.hierarchical.direction, Direction::Right);
        assert_eq!(config.hierarchical.cluster_padding.top, 40.0);
        assert_eq!(config.force.seed, Some(9));
        assert_eq!(config.force.link_distance, 200.0);
        assert_eq!(config.viewport.width, 1600.0);
        assert_eq!(config.viewport.height, 800.0);
        assert_eq!(config.theme.edges.coeff_hover, 2.0);
        assert_eq!(config.presets.non_hierarchical, Size::new(90.0, 60.0));
        assert_eq!(config.presets.resource, Size::new(80.0, 75.0));
    }

    #[test]
    fn reads_json5() {
        let path = write_temp(
            "config.json5",
            "{ flat: { direction: 'DOWN', nodeNodeSpacing: 60 }, hierarchical: { clusterPadding: 16 }, }",
        );
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.flat.direction, Direction::Down);
        assert_eq!(config.flat.node_node_spacing, 60.0);
        assert_eq!(config.hierarchical.cluster_padding, Padding::uniform(16.0));
    }

    #[test]
    fn rejects_bad_values() {
        let path = write_temp("bad.json", r#"{"flat": {"direction": "diagonal"}}"#);
        assert!(load_config(Some(&path)).is_err());
        std::fs::remove_file(&path).ok();
    }
}
