use super::sizing::{SizeFn, resolve_size};
use super::types::Padding;
use crate::ir::{GraphNode, Size};
use std::collections::HashMap;
use tracing::warn;

/// Id prefix reserved for groups synthesized from dangling parent references.
pub const VIRTUAL_PREFIX: &str = "__virtual__";

pub const ROOT_SLOT: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeKind {
    Root,
    Leaf { size: Size },
    Compound { padding: Padding },
    Virtual { padding: Padding },
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: String,
    /// Index into the input node list; `None` for the root and virtual groups.
    pub source: Option<usize>,
    pub kind: TreeKind,
    pub children: Vec<usize>,
}

impl TreeNode {
    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, TreeKind::Virtual { .. })
    }
}

pub struct TreeOptions<'a> {
    pub default_size: Size,
    pub size_by_node: Option<&'a SizeFn<'a>>,
    pub cluster_padding: Padding,
}

/// Containment forest of the visible nodes, rooted at slot 0.
#[derive(Debug, Clone)]
pub struct CompoundTree {
    pub nodes: Vec<TreeNode>,
    index: HashMap<String, usize>,
}

struct Builder<'n, 'o> {
    input: &'n [GraphNode],
    options: &'o TreeOptions<'o>,
    children_of: HashMap<&'n str, Vec<usize>>,
    visited: Vec<bool>,
    tree: CompoundTree,
}

impl CompoundTree {
    pub fn build(input: &[GraphNode], options: &TreeOptions<'_>) -> Self {
        let mut visible: HashMap<&str, usize> = HashMap::new();
        for (idx, node) in input.iter().enumerate() {
            if node.hidden {
                continue;
            }
            if visible.contains_key(node.id.as_str()) {
                warn!(id = %node.id, "duplicate node id, keeping the first occurrence");
                continue;
            }
            visible.insert(node.id.as_str(), idx);
        }

        let mut roots = Vec::new();
        let mut children_of: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut virtual_groups: Vec<(&str, Vec<usize>)> = Vec::new();
        for (idx, node) in input.iter().enumerate() {
            if visible.get(node.id.as_str()) != Some(&idx) {
                continue;
            }
            match node.parent_id.as_deref().filter(|parent| *parent != node.id) {
                None => roots.push(idx),
                Some(parent) if visible.contains_key(parent) => {
                    children_of.entry(parent).or_default().push(idx);
                }
                Some(parent) => match virtual_groups.iter_mut().find(|(id, _)| *id == parent) {
                    Some((_, members)) => members.push(idx),
                    None => virtual_groups.push((parent, vec![idx])),
                },
            }
        }

        let mut builder = Builder {
            input,
            options,
            children_of,
            visited: vec![false; input.len()],
            tree: CompoundTree {
                nodes: vec![TreeNode {
                    id: String::new(),
                    source: None,
                    kind: TreeKind::Root,
                    children: Vec::new(),
                }],
                index: HashMap::new(),
            },
        };

        for idx in roots {
            builder.attach(ROOT_SLOT, idx);
        }
        for (parent, members) in virtual_groups {
            let slot = builder.push(TreeNode {
                id: format!("{VIRTUAL_PREFIX}{parent}"),
                source: None,
                kind: TreeKind::Virtual {
                    padding: options.cluster_padding,
                },
                children: Vec::new(),
            });
            builder.tree.nodes[ROOT_SLOT].children.push(slot);
            for idx in members {
                builder.attach(slot, idx);
            }
        }

        let mut stranded: Vec<usize> = visible
            .values()
            .copied()
            .filter(|idx| !builder.visited[*idx])
            .collect();
        if !stranded.is_empty() {
            stranded.sort_unstable();
            let ids: Vec<&str> = stranded.iter().map(|idx| input[*idx].id.as_str()).collect();
            warn!(?ids, "cyclic parent references, attaching to the root");
            for idx in stranded {
                builder.attach(ROOT_SLOT, idx);
            }
        }

        builder.tree
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[ROOT_SLOT]
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of real nodes placed in the tree.
    pub fn real_len(&self) -> usize {
        self.index.len()
    }

    /// Slots of a node's ancestors, nearest first, excluding the root.
    pub fn ancestors(&self, slot: usize) -> Vec<usize> {
        let mut parents: HashMap<usize, usize> = HashMap::new();
        for (parent, node) in self.nodes.iter().enumerate() {
            for child in &node.children {
                parents.insert(*child, parent);
            }
        }
        let mut chain = Vec::new();
        let mut current = slot;
        while let Some(parent) = parents.get(&current).copied() {
            if parent == ROOT_SLOT {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

impl<'n> Builder<'n, '_> {
    fn push(&mut self, node: TreeNode) -> usize {
        self.tree.nodes.push(node);
        self.tree.nodes.len() - 1
    }

    fn attach(&mut self, parent_slot: usize, idx: usize) {
        if self.visited[idx] {
            return;
        }
        self.visited[idx] = true;
        let input = self.input;
        let node = &input[idx];
        let slot = self.push(TreeNode {
            id: node.id.clone(),
            source: Some(idx),
            kind: TreeKind::Root,
            children: Vec::new(),
        });
        self.tree.index.insert(node.id.clone(), slot);
        self.tree.nodes[parent_slot].children.push(slot);

        let children = self
            .children_of
            .get(node.id.as_str())
            .cloned()
            .unwrap_or_default();
        for child in children {
            self.attach(slot, child);
        }

        self.tree.nodes[slot].kind = if self.tree.nodes[slot].children.is_empty() {
            TreeKind::Leaf {
                size: resolve_size(node, self.options.default_size, self.options.size_by_node),
            }
        } else {
            TreeKind::Compound {
                padding: self.options.cluster_padding,
            }
        };
    }
}
