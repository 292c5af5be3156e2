//! The logical supply forest, kept independently of the physical edges.
//!
//! Every registered node has at most one parent. Roots are the designated
//! sources (generation plants); any other parentless node heads a detached
//! subtree. Children are kept in attachment order so traversals are
//! deterministic.

use std::collections::{HashMap, HashSet};

use crate::domain::NodeId;

#[derive(Debug, Default, Clone)]
pub struct HierarchyIndex {
    parent: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: Vec<NodeId>,
    registered: Vec<NodeId>,
    members: HashSet<NodeId>,
}

impl HierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node without a parent. Re-registering is a no-op.
    pub fn register(&mut self, id: &str) {
        if self.members.insert(id.to_string()) {
            self.registered.push(id.to_string());
            self.children.entry(id.to_string()).or_default();
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Registers `id` as a designated source.
    pub fn add_root(&mut self, id: &str) {
        self.register(id);
        if let Some(old_parent) = self.parent.remove(id) {
            self.unlink_child(&old_parent, id);
        }
        if !self.roots.iter().any(|root| root == id) {
            self.roots.push(id.to_string());
        }
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.roots.iter().any(|root| root == id)
    }

    /// Rewrites `child`'s parent, registering both ends if needed.
    ///
    /// The caller guarantees that `parent` is not `child` itself nor one of
    /// its descendants.
    pub fn set_parent(&mut self, child: &str, parent: &str) {
        debug_assert!(
            child != parent && !self.is_descendant(parent, child),
            "re-parenting {child} under {parent} would create a cycle"
        );
        self.register(child);
        self.register(parent);
        if let Some(old_parent) = self.parent.insert(child.to_string(), parent.to_string()) {
            self.unlink_child(&old_parent, child);
        }
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
    }

    /// Detaches `id` from its parent, returning the former parent.
    pub fn detach(&mut self, id: &str) -> Option<NodeId> {
        let old_parent = self.parent.remove(id)?;
        self.unlink_child(&old_parent, id);
        Some(old_parent)
    }

    fn unlink_child(&mut self, parent: &str, child: &str) {
        if let Some(children) = self.children.get_mut(parent) {
            children.retain(|c| c != child);
        }
    }

    /// Cuts every child of `id` loose, keeping `id` registered in place.
    /// The former children are returned in attachment order.
    pub fn detach_children(&mut self, id: &str) -> Vec<NodeId> {
        let orphans = self
            .children
            .get_mut(id)
            .map(std::mem::take)
            .unwrap_or_default();
        for child in &orphans {
            self.parent.remove(child);
        }
        orphans
    }

    /// Unregisters `id`. Its children become parentless and are returned in
    /// attachment order.
    pub fn remove_node(&mut self, id: &str) -> Vec<NodeId> {
        if !self.members.remove(id) {
            return Vec::new();
        }
        self.detach(id);
        let orphans = self.children.remove(id).unwrap_or_default();
        for child in &orphans {
            self.parent.remove(child);
        }
        self.roots.retain(|root| root != id);
        self.registered.retain(|node| node != id);
        orphans
    }

    pub fn get_parent(&self, id: &str) -> Option<&NodeId> {
        self.parent.get(id)
    }

    pub fn get_children(&self, id: &str) -> &[NodeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Parentless nodes that are not designated sources, in registration
    /// order.
    pub fn detached_heads(&self) -> Vec<&NodeId> {
        self.registered
            .iter()
            .filter(|id| !self.parent.contains_key(*id) && !self.is_root(id))
            .collect()
    }

    /// Whether `candidate` lies in the subtree rooted at `ancestor`
    /// (a node is a descendant of itself).
    pub fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut current = Some(candidate);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.registered.len() {
                break;
            }
            current = self.parent.get(id).map(String::as_str);
        }
        false
    }

    /// The topmost ancestor of `id` (itself when parentless).
    pub fn top_of(&self, id: &str) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent.get(current) {
            current = parent;
        }
        current.to_string()
    }

    /// Whether `id` is connected to a designated source.
    pub fn is_connected_to_root(&self, id: &str) -> bool {
        self.contains(id) && self.is_root(&self.top_of(id))
    }

    /// Preorder walk of the subtree rooted at `id`.
    pub fn subtree(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            stack.extend(self.get_children(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Depth-first, parent-before-children traversal of every registered
    /// node: roots in registration order first, then detached subtrees.
    pub fn iter_preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.registered.len());
        for head in self.roots.iter().chain(self.detached_heads()) {
            out.extend(self.subtree(head));
        }
        out
    }
}
