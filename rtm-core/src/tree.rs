//! Arena-backed navigation tree
//!
//! Nodes live in a flat table and refer to their children by index. There are
//! no parent links: ancestry is always recomputed by searching down from the
//! roots, so the structure cannot be mutated into a cycle.

use std::collections::{HashMap, HashSet};

use crate::error::{RtmError, RtmResult};
use crate::models::{LeafDetails, NavigationNode, NodeBody, NodeType, ScopeStatus};

/// Index of a node inside a [`NavTree`]
///
/// Indices are never reused; nodes are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(usize);

impl NodeIdx {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Folder or leaf payload of an arena slot
#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    Folder { children: Vec<NodeIdx> },
    Leaf(LeafDetails),
}

/// A node stored in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSlot {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub status: ScopeStatus,
    pub tags: Vec<String>,
    pub kind: SlotKind,
}

impl NodeSlot {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, SlotKind::Folder { .. })
    }

    /// Leaf details, `None` for folders
    pub fn details(&self) -> Option<&LeafDetails> {
        match &self.kind {
            SlotKind::Leaf(details) => Some(details),
            SlotKind::Folder { .. } => None,
        }
    }
}

/// The requirement hierarchy
#[derive(Debug, Clone, Default)]
pub struct NavTree {
    nodes: Vec<NodeSlot>,
    roots: Vec<NodeIdx>,
    by_id: HashMap<String, NodeIdx>,
}

impl NavTree {
    /// Builds the arena from a fixture forest
    pub fn from_forest(forest: &[NavigationNode]) -> RtmResult<Self> {
        let mut tree = NavTree::default();
        for node in forest {
            let idx = tree.push_subtree(node)?;
            tree.roots.push(idx);
        }
        Ok(tree)
    }

    /// Rebuilds the nested fixture representation
    pub fn to_forest(&self) -> Vec<NavigationNode> {
        self.roots.iter().map(|idx| self.to_node(*idx)).collect()
    }

    fn to_node(&self, idx: NodeIdx) -> NavigationNode {
        let slot = self.node(idx);
        let body = match &slot.kind {
            SlotKind::Folder { children } => NodeBody::Folder {
                children: children.iter().map(|c| self.to_node(*c)).collect(),
            },
            SlotKind::Leaf(details) => NodeBody::Leaf(details.clone()),
        };
        NavigationNode {
            id: slot.id.clone(),
            name: slot.name.clone(),
            node_type: slot.node_type,
            status: slot.status,
            tags: slot.tags.clone(),
            body,
        }
    }

    fn push_subtree(&mut self, node: &NavigationNode) -> RtmResult<NodeIdx> {
        if self.by_id.contains_key(&node.id) {
            return Err(RtmError::DuplicateNodeId(node.id.clone()));
        }

        let idx = NodeIdx(self.nodes.len());
        self.by_id.insert(node.id.clone(), idx);
        self.nodes.push(NodeSlot {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type,
            status: node.status,
            tags: node.tags.clone(),
            kind: match &node.body {
                NodeBody::Folder { .. } => SlotKind::Folder {
                    children: Vec::new(),
                },
                NodeBody::Leaf(details) => SlotKind::Leaf(details.clone()),
            },
        });

        if let NodeBody::Folder { children } = &node.body {
            let mut child_indices = Vec::with_capacity(children.len());
            for child in children {
                child_indices.push(self.push_subtree(child)?);
            }
            if let SlotKind::Folder { children } = &mut self.nodes[idx.0].kind {
                *children = child_indices;
            }
        }

        Ok(idx)
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes
    pub fn roots(&self) -> &[NodeIdx] {
        &self.roots
    }

    /// Slot for an index handed out by this tree
    ///
    /// Panics if the index came from a different tree.
    pub fn node(&self, idx: NodeIdx) -> &NodeSlot {
        &self.nodes[idx.0]
    }

    pub fn get(&self, idx: NodeIdx) -> Option<&NodeSlot> {
        self.nodes.get(idx.0)
    }

    /// Looks up a node by its id
    pub fn find(&self, id: &str) -> Option<NodeIdx> {
        self.by_id.get(id).copied()
    }

    /// Looks up a node by id, failing with `NodeNotFound`
    pub fn require(&self, id: &str) -> RtmResult<NodeIdx> {
        self.find(id)
            .ok_or_else(|| RtmError::NodeNotFound(id.to_string()))
    }

    pub fn is_folder(&self, idx: NodeIdx) -> bool {
        self.node(idx).is_folder()
    }

    /// Children of a folder, `None` for a leaf
    pub fn children(&self, idx: NodeIdx) -> Option<&[NodeIdx]> {
        match &self.node(idx).kind {
            SlotKind::Folder { children } => Some(children),
            SlotKind::Leaf(_) => None,
        }
    }

    /// Iterates all nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &NodeSlot)> {
        self.nodes.iter().enumerate().map(|(i, slot)| (NodeIdx(i), slot))
    }

    /// Ordered ancestor chain of `id`, root first, target excluded
    ///
    /// Returns `None` when no node with that id is reachable from the roots.
    pub fn path_to(&self, id: &str) -> Option<Vec<NodeIdx>> {
        let mut trail = Vec::new();
        for root in &self.roots {
            if self.search(*root, id, &mut trail) {
                return Some(trail);
            }
        }
        None
    }

    fn search(&self, current: NodeIdx, id: &str, trail: &mut Vec<NodeIdx>) -> bool {
        if self.node(current).id == id {
            return true;
        }
        if let Some(children) = self.children(current) {
            trail.push(current);
            for child in children {
                if self.search(*child, id, trail) {
                    return true;
                }
            }
            trail.pop();
        }
        false
    }

    /// Whether `idx` or any descendant satisfies `pred` on a leaf
    pub fn any_leaf(&self, idx: NodeIdx, pred: &dyn Fn(&NodeSlot) -> bool) -> bool {
        match self.children(idx) {
            None => pred(self.node(idx)),
            Some(children) => children.iter().any(|c| self.any_leaf(*c, pred)),
        }
    }

    /// Inserts a subtree under `parent` (or at the root level)
    ///
    /// Fails with `NotAFolder` when the parent is a leaf and with
    /// `DuplicateNodeId` when any id of the subtree is already taken.
    pub fn insert(&mut self, parent: Option<NodeIdx>, node: &NavigationNode) -> RtmResult<NodeIdx> {
        if let Some(parent) = parent {
            if !self.is_folder(parent) {
                return Err(RtmError::NotAFolder(self.node(parent).id.clone()));
            }
        }
        if let Some(dup) = first_duplicate(node, &self.by_id, &mut HashSet::new()) {
            return Err(RtmError::DuplicateNodeId(dup));
        }

        let idx = self.push_subtree(node)?;
        match parent {
            Some(parent) => {
                if let SlotKind::Folder { children } = &mut self.nodes[parent.0].kind {
                    children.push(idx);
                }
            }
            None => self.roots.push(idx),
        }
        Ok(idx)
    }

    /// Replaces the tags of a node
    pub fn set_tags(&mut self, idx: NodeIdx, tags: Vec<String>) {
        self.nodes[idx.0].tags = tags;
    }
}

fn first_duplicate(
    node: &NavigationNode,
    taken: &HashMap<String, NodeIdx>,
    seen: &mut HashSet<String>,
) -> Option<String> {
    if taken.contains_key(&node.id) || !seen.insert(node.id.clone()) {
        return Some(node.id.clone());
    }
    node.children().and_then(|children| {
        children
            .iter()
            .find_map(|c| first_duplicate(c, taken, seen))
    })
}
