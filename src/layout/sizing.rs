use crate::ir::{GraphNode, Size};
use serde_json::Value;

/// Box used by the flat engines when a node carries no size of its own.
pub const FLAT_DEFAULT_SIZE: Size = Size::new(180.0, 60.0);

/// Caller supplied per-node size override.
pub type SizeFn<'a> = dyn Fn(&GraphNode) -> Option<Size> + Send + Sync + 'a;

/// Size a leaf node takes in the compound layout.
///
/// The override wins outright. Otherwise each axis falls back to the default
/// independently when the node does not carry it.
pub fn resolve_size(node: &GraphNode, default_size: Size, size_by_node: Option<&SizeFn<'_>>) -> Size {
    if let Some(size) = size_by_node.and_then(|callback| callback(node)) {
        return size;
    }
    Size::new(
        node.width.unwrap_or(default_size.width),
        node.height.unwrap_or(default_size.height),
    )
}

/// Size used by the flat engines: own width/height, then `style.width`/`style.height`.
pub fn collect_size(node: &GraphNode, default_size: Size) -> Size {
    let style_axis = |key: &str| {
        node.style
            .as_ref()
            .and_then(|style| style.get(key))
            .and_then(Value::as_f64)
    };
    Size::new(
        node.width.or_else(|| style_axis("width")).unwrap_or(default_size.width),
        node.height.or_else(|| style_axis("height")).unwrap_or(default_size.height),
    )
}
