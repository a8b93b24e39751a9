//! Tab-like selection of nodes.
//!
//! Selection is keyed by full path only; it never holds tree references, so a
//! node pruned from the tree leaves at most a stale path behind until the
//! owning operation clears it.

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Open tabs in order, with the pinned subset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionState {
    selected: Vec<String>,
    /// Pinned paths, in pin order.
    pinned: Vec<String>,
    #[serde(skip)]
    ever_selected: HashSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn pinned(&self) -> &[String] {
        &self.pinned
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.iter().any(|p| p == path)
    }

    pub fn is_pinned(&self, path: &str) -> bool {
        self.pinned.iter().any(|p| p == path)
    }

    /// Append `path` unless it is already open.
    pub fn select(&mut self, path: &str) {
        self.ever_selected.insert(path.to_string());
        if !self.is_selected(path) {
            self.selected.push(path.to_string());
        }
    }

    /// Close `path` and drop its pin.
    pub fn unselect(&mut self, path: &str) {
        self.selected.retain(|p| p != path);
        self.pinned.retain(|p| p != path);
    }

    /// Flip the pin of `path`; returns the new pin state.
    ///
    /// Paths that were never selected cannot be pinned.
    pub fn toggle_pin(&mut self, path: &str) -> bool {
        if self.is_pinned(path) {
            self.pinned.retain(|p| p != path);
            return false;
        }
        if !self.ever_selected.contains(path) {
            debug!(path, "Ignoring pin of a path that was never selected");
            return false;
        }
        self.pinned.push(path.to_string());
        true
    }

    /// Keep `keep` and the pinned tabs, in their prior relative order.
    ///
    /// `keep` goes first when it was not open yet.
    pub fn close_others(&mut self, keep: &str) {
        self.ever_selected.insert(keep.to_string());
        let mut next: Vec<String> = Vec::with_capacity(self.pinned.len() + 1);
        if !self.is_selected(keep) {
            next.push(keep.to_string());
        }
        for path in &self.selected {
            if (path == keep || self.is_pinned(path)) && !next.contains(path) {
                next.push(path.clone());
            }
        }
        self.append_unlisted_pins(&mut next);
        self.selected = next;
    }

    /// Keep exactly the pinned tabs, in their prior relative order.
    pub fn close_all_but_pinned(&mut self) {
        let mut next: Vec<String> = self
            .selected
            .iter()
            .filter(|path| self.is_pinned(path))
            .cloned()
            .collect();
        self.append_unlisted_pins(&mut next);
        self.selected = next;
    }

    /// Forget `path` entirely after it was deleted.
    pub fn delete_node(&mut self, path: &str) {
        self.unselect(path);
        self.ever_selected.remove(path);
    }

    /// Forget `path` and every path below it.
    pub fn delete_subtree(&mut self, path: &str) {
        let prefix = format!("{}:", path);
        let inside = |p: &String| p == path || p.starts_with(&prefix);
        self.selected.retain(|p| !inside(p));
        self.pinned.retain(|p| !inside(p));
        self.ever_selected.retain(|p| !inside(p));
    }

    fn append_unlisted_pins(&self, next: &mut Vec<String>) {
        for path in &self.pinned {
            if !next.contains(path) {
                next.push(path.clone());
            }
        }
    }
}
