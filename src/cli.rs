use crate::config::{Config, load_config};
use crate::decoration::{GraphTopology, IamDisplay};
use crate::ir::{Direction, Graph, Size};
use crate::layout::{layout_flat_layered, layout_force_directed};
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::manifest::{GraphManifest, load_graph};
use crate::render::{render_svg, write_output_svg};
use crate::scan::{ResourceErrors, default_scan_path, load_resource_errors};
use crate::state::{ViewState, layout_for_topology};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::executor::block_on;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cvlayout", version, about = "Lays out cloud infrastructure graphs")]
pub struct Args {
    /// Input graph JSON or '-' for stdin
    #[arg(short = 'i', long = "input", conflicts_with = "manifest")]
    pub input: Option<PathBuf>,

    /// Graph manifest listing named graphs and their variants
    #[arg(long = "manifest", requires = "graph")]
    pub manifest: Option<PathBuf>,

    /// Graph name inside the manifest
    #[arg(long = "graph")]
    pub graph: Option<String>,

    /// Graph variant: simplified (nested) or complete (flat)
    #[arg(long = "variant", default_value = "simplified")]
    pub variant: String,

    /// Output file. Defaults to stdout for JSON and SVG.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout engine
    #[arg(short = 'm', long = "mode", value_enum, default_value = "hierarchical")]
    pub mode: Mode,

    /// Flow direction of the layered engines
    #[arg(short = 'd', long = "direction", value_enum)]
    pub direction: Option<FlowDirection>,

    /// Config JSON or JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Viewport width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Viewport height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,

    /// Seed of the force simulation
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Which IAM edges and roles to show
    #[arg(long = "iam", value_enum, default_value = "res-res")]
    pub iam: IamMode,

    /// Label resource edges with their JSON path
    #[arg(long = "labels")]
    pub labels: bool,

    /// Scan findings to annotate nodes with
    #[arg(long = "findings")]
    pub findings: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Hierarchical,
    Force,
    Layered,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FlowDirection {
    Down,
    Up,
    Left,
    Right,
}

impl From<FlowDirection> for Direction {
    fn from(value: FlowDirection) -> Self {
        match value {
            FlowDirection::Down => Direction::Down,
            FlowDirection::Up => Direction::Up,
            FlowDirection::Left => Direction::Left,
            FlowDirection::Right => Direction::Right,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum IamMode {
    ResRes,
    ResRole,
    Off,
}

impl From<IamMode> for IamDisplay {
    fn from(value: IamMode) -> Self {
        match value {
            IamMode::ResRes => IamDisplay::ResRes,
            IamMode::ResRole => IamDisplay::ResRole,
            IamMode::Off => IamDisplay::Off,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);

    let (graph, topology, findings) = read_graph_input(&args)?;
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        topology = topology.variant(),
        "graph loaded"
    );

    let mut state = ViewState::new(args.iam.into(), topology);
    state.set_show_edge_labels(args.labels);
    let ticket = state.set_graph(graph);
    let viewport = config.viewport.viewport();
    let laid_out = block_on(async {
        match args.mode {
            Mode::Hierarchical => {
                let size = Size::new(viewport.width, viewport.height);
                layout_for_topology(&ticket.graph, ticket.topology, &config, Some(size)).await
            }
            Mode::Force => {
                layout_force_directed(
                    &ticket.graph.nodes,
                    &ticket.graph.edges,
                    &viewport,
                    &config.force.options(),
                )
                .await
                .map(|nodes| Graph::new(nodes, ticket.graph.edges.clone()))
            }
            Mode::Layered => {
                layout_flat_layered(
                    &ticket.graph.nodes,
                    &ticket.graph.edges,
                    &viewport,
                    &config.flat.options(),
                )
                .await
                .map(|nodes| Graph::new(nodes, ticket.graph.edges.clone()))
            }
        }
    })?;
    state.commit_layout(ticket.generation, laid_out);
    info!(mode = ?args.mode, "layout committed");

    match args.output_format {
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_layout_dump(path, &state, &config.theme.edges, &findings)?,
            None => {
                let dump = LayoutDump::from_state(&state, &config.theme.edges, &findings);
                println!("{}", serde_json::to_string_pretty(&dump)?);
            }
        },
        OutputFormat::Svg => {
            let dump = LayoutDump::from_state(&state, &config.theme.edges, &findings);
            write_output_svg(&render_svg(&dump, &config.theme), args.output.as_deref())?;
        }
        OutputFormat::Png => write_png(&args, &config, &state, &findings)?,
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(args: &Args, config: &Config, state: &ViewState, findings: &ResourceErrors) -> Result<()> {
    let output = ensure_output(&args.output, "png")?;
    let dump = LayoutDump::from_state(state, &config.theme.edges, findings);
    let svg = render_svg(&dump, &config.theme);
    crate::render::write_output_png(
        &svg,
        &output,
        config.viewport.width as f32,
        config.viewport.height as f32,
    )
}

#[cfg(not(feature = "png"))]
fn write_png(_args: &Args, _config: &Config, _state: &ViewState, _findings: &ResourceErrors) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(width) = args.width {
        config.viewport.width = width;
    }
    if let Some(height) = args.height {
        config.viewport.height = height;
    }
    if let Some(direction) = args.direction {
        config.hierarchical.direction = direction.into();
        config.flat.direction = direction.into();
    }
    if args.seed.is_some() {
        config.force.seed = args.seed;
    }
}

fn read_graph_input(args: &Args) -> Result<(Graph, GraphTopology, ResourceErrors)> {
    if let (Some(manifest_path), Some(name)) = (args.manifest.as_deref(), args.graph.as_deref()) {
        let manifest = GraphManifest::load(manifest_path)?;
        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let variant = manifest.effective_variant(name, &args.variant);
        let topology = GraphTopology::from_variant(variant).unwrap_or_default();
        let graph = load_graph(&manifest, base_dir, name, variant);
        let findings_path = args
            .findings
            .clone()
            .unwrap_or_else(|| default_scan_path(base_dir, name));
        let findings = if args.findings.is_some() || findings_path.exists() {
            load_resource_errors(&findings_path)
        } else {
            ResourceErrors::default()
        };
        return Ok((graph, topology, findings));
    }

    let raw = read_input(args.input.as_deref())?;
    let graph: Graph = serde_json::from_str(&raw).context("failed to parse graph JSON")?;
    let topology = GraphTopology::from_variant(&args.variant).unwrap_or_default();
    let findings = args
        .findings
        .as_deref()
        .map(load_resource_errors)
        .unwrap_or_default();
    Ok((graph, topology, findings))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(feature = "png")]
fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        ext
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_flags() {
        let args = Args::try_parse_from([
            "cvlayout", "-i", "graph.json", "-m", "force", "-d", "right", "-w", "900", "--seed", "7",
            "--iam", "res-role", "--labels", "-e", "svg",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::Force);
        assert!(args.labels);

        let mut config = Config::default();
        apply_args(&mut config, &args);
        assert_eq!(config.viewport.width, 900.0);
        assert_eq!(config.viewport.height, 800.0);
        assert_eq!(config.flat.direction, Direction::Right);
        assert_eq!(config.force.seed, Some(7));
        assert_eq!(IamDisplay::from(args.iam), IamDisplay::ResRole);
    }

    #[test]
    fn manifest_requires_a_graph_name() {
        assert!(Args::try_parse_from(["cvlayout", "--manifest", "m.json"]).is_err());
        assert!(Args::try_parse_from(["cvlayout", "-i", "g.json", "--manifest", "m.json", "--graph", "g"]).is_err());
    }
}
