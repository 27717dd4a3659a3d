//! Static SVG/PNG preview of a dumped layout.

use crate::decoration::EdgeDecoration;
use crate::ir::{NodeKind, Position};
use crate::layout_dump::{EdgeDump, LayoutDump, NodeDump};
use crate::scan::indicator_color;
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const MARGIN: f64 = 16.0;

pub fn render_svg(dump: &LayoutDump, theme: &Theme) -> String {
    let mut svg = String::new();
    let width = (dump.width + MARGIN * 2.0).max(200.0);
    let height = (dump.height + MARGIN * 2.0).max(200.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"{:.2} {:.2} {width:.2} {height:.2}\">",
        -MARGIN, -MARGIN,
    ));
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        -MARGIN, -MARGIN, theme.background
    ));

    let nodes: HashMap<&str, &NodeDump> = dump
        .nodes
        .iter()
        .filter(|node| !node.hidden)
        .map(|node| (node.id.as_str(), node))
        .collect();

    svg.push_str("<defs>");
    for (idx, edge) in dump.edges.iter().enumerate() {
        if let Some(marker) = edge.decoration.marker_end.as_ref() {
            svg.push_str(&format!(
                "<marker id=\"arrow-{idx}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"{:.1}\" markerHeight=\"{:.1}\" markerUnits=\"userSpaceOnUse\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
                marker.width, marker.height, marker.color
            ));
        }
    }
    svg.push_str("</defs>");

    // Containers first, outermost first, so children paint over them.
    let mut containers: Vec<&NodeDump> = dump
        .nodes
        .iter()
        .filter(|node| !node.hidden && kind_of(node).is_container())
        .collect();
    containers.sort_by(|a, b| depth(a, &nodes).cmp(&depth(b, &nodes)));
    for node in containers {
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-dasharray=\"6 4\" stroke-width=\"1.2\"/>",
            node.absolute.x,
            node.absolute.y,
            node.width,
            node.height,
            theme.container_fill,
            theme.container_border
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            node.absolute.x + 10.0,
            node.absolute.y + 20.0,
            theme.font_family,
            theme.font_size,
            theme.text_color,
            escape_xml(&node.id)
        ));
    }

    for (idx, edge) in dump.edges.iter().enumerate() {
        if edge.decoration.hidden == Some(true) {
            continue;
        }
        let (Some(source), Some(target)) =
            (nodes.get(edge.source.as_str()), nodes.get(edge.target.as_str()))
        else {
            continue;
        };
        svg.push_str(&edge_svg(idx, edge, source, target, theme));
    }

    for node in dump.nodes.iter().filter(|node| !node.hidden && !kind_of(node).is_container()) {
        let fill = match kind_of(node) {
            NodeKind::Iam => theme.iam_fill.as_str(),
            _ => theme.node_fill.as_str(),
        };
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
            node.absolute.x, node.absolute.y, node.width, node.height, fill, theme.node_border
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            node.absolute.x + node.width / 2.0,
            node.absolute.y + node.height / 2.0 + theme.font_size as f64 / 2.0,
            theme.font_family,
            theme.font_size,
            theme.text_color,
            escape_xml(&node.id)
        ));
        if node.failed_checks > 0 {
            let cx = node.absolute.x + node.width;
            let cy = node.absolute.y;
            svg.push_str(&format!(
                "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"8\" fill=\"{}\"/><text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"9\" fill=\"#FFFFFF\">{}</text>",
                indicator_color(node.failed_checks),
                cy + 3.0,
                theme.font_family,
                node.failed_checks
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn kind_of(node: &NodeDump) -> NodeKind {
    NodeKind::from_tag(node.kind.as_deref())
}

fn depth(node: &NodeDump, nodes: &HashMap<&str, &NodeDump>) -> usize {
    let mut depth = 0;
    let mut current = node;
    while let Some(parent) = current.parent_id.as_deref().and_then(|id| nodes.get(id)) {
        depth += 1;
        // Bounded for cyclic input.
        if depth > nodes.len() {
            break;
        }
        current = parent;
    }
    depth
}

/// Point on the node's border the handle sits on; the default anchor is the
/// bottom centre for sources and the top centre for targets.
fn anchor(node: &NodeDump, handle: Option<&str>, is_source: bool) -> Position {
    let Position { x, y } = node.absolute;
    let (w, h) = (node.width, node.height);
    match handle {
        Some("top") => Position::new(x + w / 2.0, y),
        Some("right") => Position::new(x + w, y + h / 2.0),
        Some("left") => Position::new(x, y + h / 2.0),
        Some("bottom") => Position::new(x + w / 2.0, y + h),
        _ if is_source => Position::new(x + w / 2.0, y + h),
        _ => Position::new(x + w / 2.0, y),
    }
}

fn edge_svg(idx: usize, edge: &EdgeDump, source: &NodeDump, target: &NodeDump, theme: &Theme) -> String {
    let from = anchor(source, edge.source_handle.as_deref(), true);
    let to = anchor(target, edge.target_handle.as_deref(), false);
    let EdgeDecoration {
        animated,
        marker_end,
        style,
        label,
        ..
    } = &edge.decoration;
    let (stroke, stroke_width) = style
        .as_ref()
        .map(|style| (style.stroke.as_str(), style.stroke_width))
        .unwrap_or((theme.line_color.as_str(), 1.0));
    let marker = if marker_end.is_some() {
        format!(" marker-end=\"url(#arrow-{idx})\"")
    } else {
        String::new()
    };
    let dash = if *animated { " stroke-dasharray=\"5 5\"" } else { "" };

    let mut out = format!(
        "<path d=\"M {:.2} {:.2} L {:.2} {:.2}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"{stroke_width:.2}\"{dash}{marker}/>",
        from.x, from.y, to.x, to.y
    );
    if let Some(label) = label.as_ref()
        && let Some(text) = label.text.as_deref()
    {
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            (from.x + to.x) / 2.0,
            (from.y + to.y) / 2.0,
            theme.font_family,
            label.font_size,
            label.fill,
            escape_xml(text)
        ));
    }
    out
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, width: f32, height: f32) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    if let Some(size) = usvg::Size::from_wh(width, height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
