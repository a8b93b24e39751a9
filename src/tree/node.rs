//! Keyspace node types

use crate::types::{EntryPointInfo, NodeContent};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Handle to a node inside its [`NodeTree`](super::NodeTree).
///
/// Freed slots are reused under a new generation, so an id whose node was
/// pruned stops resolving even after its slot holds another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

/// Attributes revealed by a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeAttrs {
    /// Child count hint; `None` or `Some(0)` means leaf.
    pub length: Option<u64>,
    pub has_content: bool,
}

impl NodeAttrs {
    pub fn new(length: Option<u64>, has_content: bool) -> Self {
        Self {
            length,
            has_content,
        }
    }
}

/// A tree entry.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) full_path: OnceLock<String>,
    pub(crate) length: Option<u64>,
    pub(crate) has_content: bool,
    /// Loaded children by name; never `Some` of an empty map.
    pub(crate) children: Option<BTreeMap<String, NodeId>>,
    /// Non-owning back-reference.
    pub(crate) parent: Option<NodeId>,
    pub(crate) info: Option<EntryPointInfo>,
    pub(crate) content: Option<NodeContent>,
    pub(crate) level: usize,
}

impl Node {
    pub(crate) fn new(name: String, attrs: NodeAttrs, parent: Option<NodeId>, level: usize) -> Self {
        Self {
            name,
            full_path: OnceLock::new(),
            length: attrs.length,
            has_content: attrs.has_content,
            children: None,
            parent,
            info: None,
            content: None,
            level,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn info(&self) -> Option<&EntryPointInfo> {
        self.info.as_ref()
    }

    pub fn content(&self) -> Option<&NodeContent> {
        self.content.as_ref()
    }

    /// Loaded children, sorted by name.
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children
            .iter()
            .flat_map(|map| map.iter().map(|(name, id)| (name.as_str(), *id)))
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.as_ref().and_then(|map| map.get(name).copied())
    }

    pub fn has_loaded_children(&self) -> bool {
        self.children.as_ref().map_or(false, |map| !map.is_empty())
    }

    /// True when the node may have children, loaded or not.
    pub fn has_children(&self) -> bool {
        self.has_loaded_children() || self.length.unwrap_or(0) > 0
    }

    pub fn is_leaf(&self) -> bool {
        !self.has_children()
    }

    /// Neither loaded children nor content: candidate for pruning.
    pub fn is_empty(&self) -> bool {
        !self.has_loaded_children() && !self.has_content
    }

    pub(crate) fn apply(&mut self, attrs: NodeAttrs) {
        self.length = attrs.length;
        self.has_content = attrs.has_content;
    }
}
