//! Keyspace Tree
//!
//! Lazily populated in-memory tree of entrypoints. Ownership flows strictly
//! downward through an arena; parents are plain index back-references used for
//! path derivation and upward pruning. Freed slots go to a free list and are
//! handed out again under a bumped generation. Every operation tolerates ids
//! whose node has vanished and treats them as no-ops.

pub mod node;

pub use node::{Node, NodeAttrs, NodeId};

use crate::types::{EntryPointInfo, EntryPointRecord, NodeContent, PATH_SEPARATOR};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed tree rooted at the data source.
#[derive(Debug)]
pub struct NodeTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    root: NodeId,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Create a tree holding only the unnamed data source root (level 0).
    pub fn new() -> Self {
        let root = Node::new(String::new(), NodeAttrs::default(), None, 0);
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            live: 1,
            root: NodeId {
                index: 0,
                generation: 0,
            },
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Allocated arena slots, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.get(self.root)
            .map_or(true, |root| !root.has_loaded_children())
    }

    /// Create or update the child `name` of `parent`.
    ///
    /// Returns `None` when `parent` no longer exists.
    pub fn upsert_child(&mut self, parent: NodeId, name: &str, attrs: NodeAttrs) -> Option<NodeId> {
        if let Some(existing) = self.get(parent)?.child(name) {
            if let Some(node) = self.get_mut(existing) {
                node.apply(attrs);
            }
            return Some(existing);
        }
        Some(self.create_child(parent, name, attrs))
    }

    fn create_child(&mut self, parent: NodeId, name: &str, attrs: NodeAttrs) -> NodeId {
        let level = self.get(parent).map_or(0, |p| p.level + 1);
        let id = self.allocate(Node::new(name.to_string(), attrs, Some(parent), level));
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node
                .children
                .get_or_insert_with(BTreeMap::new)
                .insert(name.to_string(), id);
        }
        id
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Insert a colon-delimited path below `base`, creating missing intermediate
    /// segments. Only the last segment receives `attrs`.
    pub fn insert_relative(&mut self, base: NodeId, path: &str, attrs: NodeAttrs) -> Option<NodeId> {
        self.get(base)?;
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let (last, intermediate) = segments.split_last()?;
        let mut current = base;
        for segment in intermediate {
            current = match self.get(current)?.child(segment) {
                Some(existing) => existing,
                None => self.create_child(current, segment, NodeAttrs::default()),
            };
        }
        self.upsert_child(current, last, attrs)
    }

    /// Merge listing records below `base`, sorted by path so parents come first.
    ///
    /// Returns the number of merged records; zero when `base` vanished.
    pub fn merge_records(&mut self, base: NodeId, records: &[EntryPointRecord]) -> usize {
        if !self.contains(base) {
            return 0;
        }
        let mut sorted: Vec<&EntryPointRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        let mut merged = 0;
        for record in sorted {
            let attrs = NodeAttrs::new(Some(record.length), record.has_content);
            if self.insert_relative(base, &record.path, attrs).is_some() {
                merged += 1;
            }
        }
        merged
    }

    /// Memoized full path: parent's path, `:`, own name; the bare name below the root.
    pub fn full_path(&self, id: NodeId) -> Option<&str> {
        let node = self.get(id)?;
        if let Some(path) = node.full_path.get() {
            return Some(path.as_str());
        }
        let computed = match node.parent.and_then(|parent| self.full_path(parent)) {
            Some(parent_path) if !parent_path.is_empty() => {
                format!("{}{}{}", parent_path, PATH_SEPARATOR, node.name)
            }
            _ => node.name.clone(),
        };
        Some(node.full_path.get_or_init(|| computed).as_str())
    }

    /// Resolve a full path to a node by walking segments from the root.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        if path.is_empty() {
            return Some(self.root);
        }
        path.split(PATH_SEPARATOR)
            .try_fold(self.root, |current, segment| self.get(current)?.child(segment))
    }

    /// Create the nodes of `path` below the root if missing, keeping existing attributes.
    pub fn ensure_path(&mut self, path: &str) -> NodeId {
        if let Some(existing) = self.find(path) {
            return existing;
        }
        let mut current = self.root;
        for segment in path.split(PATH_SEPARATOR) {
            current = match self.get(current).and_then(|node| node.child(segment)) {
                Some(existing) => existing,
                None => self.create_child(current, segment, NodeAttrs::default()),
            };
        }
        current
    }

    /// Remove `id` from its parent when it has neither loaded children nor content.
    ///
    /// Roots and vanished nodes are left alone. Returns whether the node was pruned.
    pub fn prune_if_empty(&mut self, id: NodeId) -> bool {
        let (parent, name) = match self.get(id) {
            Some(node) if node.is_empty() => match node.parent {
                Some(parent) => (parent, node.name.clone()),
                None => return false,
            },
            _ => return false,
        };
        debug!(path = self.full_path(id).unwrap_or_default(), "Pruning empty node");
        self.detach(parent, &name);
        true
    }

    /// Prune `id`, then each ancestor that became empty, stopping below the root.
    ///
    /// Returns the full paths of the pruned nodes, deepest first.
    pub fn prune_upwards(&mut self, id: NodeId) -> Vec<String> {
        let mut pruned = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if self.is_root(node_id) {
                break;
            }
            let path = self.full_path(node_id).map(str::to_string);
            let parent = self.get(node_id).and_then(Node::parent);
            if !self.prune_if_empty(node_id) {
                break;
            }
            pruned.extend(path);
            current = parent;
        }
        pruned
    }

    /// Drop loaded children and content so the node is fetched again.
    pub fn clear(&mut self, id: NodeId) {
        self.drop_children(id);
        if let Some(node) = self.get_mut(id) {
            node.content = None;
        }
    }

    /// Drop loaded children and record that none remain server-side.
    pub fn clear_children(&mut self, id: NodeId) {
        self.drop_children(id);
        if let Some(node) = self.get_mut(id) {
            node.length = Some(0);
        }
    }

    /// Record that the value behind `id` was deleted server-side.
    pub fn mark_content_deleted(&mut self, id: NodeId) {
        if let Some(node) = self.get_mut(id) {
            node.has_content = false;
            node.content = None;
            node.info = None;
        }
    }

    pub fn set_details(&mut self, id: NodeId, info: EntryPointInfo, content: NodeContent) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.info = Some(info);
                node.content = Some(content);
                true
            }
            None => false,
        }
    }

    fn drop_children(&mut self, id: NodeId) {
        let children = match self.get_mut(id) {
            Some(node) => node.children.take(),
            None => return,
        };
        for (_, child) in children.into_iter().flatten() {
            self.release(child);
        }
    }

    fn detach(&mut self, parent: NodeId, name: &str) {
        let removed = match self.get_mut(parent) {
            Some(parent_node) => {
                let removed = parent_node
                    .children
                    .as_mut()
                    .and_then(|children| children.remove(name));
                if parent_node
                    .children
                    .as_ref()
                    .map_or(false, BTreeMap::is_empty)
                {
                    parent_node.children = None;
                }
                if removed.is_some() {
                    parent_node.length = parent_node.length.map(|l| l.saturating_sub(1));
                }
                removed
            }
            None => None,
        };
        if let Some(child) = removed {
            self.release(child);
        }
    }

    /// Free a detached subtree.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = match self.slots.get_mut(current.index) {
                Some(slot) if slot.generation == current.generation => slot,
                _ => continue,
            };
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                self.live -= 1;
                stack.extend(node.children.into_iter().flat_map(BTreeMap::into_values));
            }
        }
    }

    /// Ids of the loaded descendants of `id`, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get(id)
            .map(|node| node.children().map(|(_, child)| child).collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children().map(|(_, child)| child));
            }
        }
        out
    }
}
