//! Catalogue of available graphs and their variants.

use crate::decoration::GraphTopology;
use crate::ir::Graph;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Variant name (`simplified`, `complete`) to graph URI.
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphManifest {
    #[serde(default)]
    pub graphs: Vec<ManifestEntry>,
}

impl GraphManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.graphs.iter().find(|entry| entry.name == name)
    }

    pub fn graph_names(&self) -> Vec<&str> {
        self.graphs.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn resolve(&self, name: &str, variant: &str) -> Option<&str> {
        self.entry(name)?.variants.get(variant).map(String::as_str)
    }

    /// Swaps `simplified` and `complete` when only the other one exists.
    pub fn effective_variant<'a>(&self, name: &str, requested: &'a str) -> &'a str {
        let Some(entry) = self.entry(name) else {
            return requested;
        };
        let has = |topology: GraphTopology| entry.variants.contains_key(topology.variant());
        match GraphTopology::from_variant(requested) {
            Some(GraphTopology::Hierarchical)
                if !has(GraphTopology::Hierarchical) && has(GraphTopology::Flat) =>
            {
                GraphTopology::Flat.variant()
            }
            Some(GraphTopology::Flat)
                if !has(GraphTopology::Flat) && has(GraphTopology::Hierarchical) =>
            {
                GraphTopology::Hierarchical.variant()
            }
            _ => requested,
        }
    }
}

/// Maps a manifest URI onto the filesystem. Absolute web paths such as
/// `/graphs/demo.json` are taken relative to the manifest's directory.
pub fn resolve_uri(base_dir: &Path, uri: &str) -> Result<PathBuf> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        bail!("remote graph URIs are not supported: {uri}");
    }
    let local = uri.strip_prefix("file://").unwrap_or(uri);
    Ok(base_dir.join(local.trim_start_matches('/')))
}

pub fn read_graph(path: &Path) -> Result<Graph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse graph {}", path.display()))
}

/// Loads one variant of a named graph, or the empty graph when it cannot.
pub fn load_graph(manifest: &GraphManifest, base_dir: &Path, name: &str, variant: &str) -> Graph {
    let Some(uri) = manifest.resolve(name, variant) else {
        debug!(name, variant, "graph variant not listed in manifest");
        return Graph::default();
    };
    match resolve_uri(base_dir, uri).and_then(|path| read_graph(&path)) {
        Ok(graph) => graph,
        Err(err) => {
            warn!(name, variant, error = %err, "failed to load graph");
            Graph::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> GraphManifest {
        serde_json::from_str(
            r#"{"graphs": [
                {"name": "both", "variants": {"simplified": "/a.json", "complete": "/b.json"}},
                {"name": "flat-only", "variants": {"complete": "/c.json"}},
                {"name": "nested-only", "variants": {"simplified": "/d.json"}},
                {"name": "none", "variants": {}}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_variants() {
        let manifest = manifest();
        assert_eq!(manifest.resolve("both", "complete"), Some("/b.json"));
        assert_eq!(manifest.resolve("both", "other"), None);
        assert_eq!(manifest.resolve("missing", "complete"), None);
        assert_eq!(manifest.graph_names(), vec!["both", "flat-only", "nested-only", "none"]);
    }

    #[test]
    fn falls_back_to_the_other_variant() {
        let manifest = manifest();
        assert_eq!(manifest.effective_variant("flat-only", "simplified"), "complete");
        assert_eq!(manifest.effective_variant("nested-only", "complete"), "simplified");
        assert_eq!(manifest.effective_variant("both", "complete"), "complete");
        assert_eq!(manifest.effective_variant("none", "simplified"), "simplified");
        assert_eq!(manifest.effective_variant("missing", "complete"), "complete");
    }

    #[test]
    fn uris_are_local_to_the_manifest() {
        let base = Path::new("/data");
        assert_eq!(resolve_uri(base, "/graphs/x.json").unwrap(), Path::new("/data/graphs/x.json"));
        assert_eq!(resolve_uri(base, "y.json").unwrap(), Path::new("/data/y.json"));
        assert!(resolve_uri(base, "https://example.com/z.json").is_err());
    }

    #[test]
    fn unresolvable_graphs_load_empty() {
        let manifest = manifest();
        let graph = load_graph(&manifest, Path::new("/nonexistent"), "both", "complete");
        assert!(graph.is_empty());
        assert!(load_graph(&manifest, Path::new("."), "none", "complete").is_empty());
    }
}
