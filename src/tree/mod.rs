//! Arena backed configuration tree.
//!
//! Nodes live in a slot vector addressed by [`NodeId`]; children are id lists
//! and the parent is an optional id. This module only maintains structure.
//! View notifications and per-kind lifecycle side effects are driven by
//! [`Workspace`](crate::workspace::Workspace), which is the only sanctioned
//! way to mutate a live tree.
//!
//! Invariants kept here:
//! - every node except a root has exactly one parent and appears exactly once
//!   in that parent's child list
//! - a node is destroyed only after its prepare-delete pass ran exactly once
//!   and its child list is empty; violations are logged and counted in
//!   [`ConfigTree::integrity_faults`]

pub mod id;
pub mod kind;
pub mod node;

pub use id::NodeId;
pub use kind::{ItemKind, ItemStatus, SaveOptions};
pub use node::{CfgNode, NodeState, Payload};

#[derive(Debug, Default)]
pub struct ConfigTree {
    nodes: Vec<Option<CfgNode>>,
    live: usize,
    integrity_faults: u32,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a detached node and return its id
    pub fn alloc(&mut self, node: CfgNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.live += 1;
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&CfgNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut CfgNode> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn kind(&self, id: NodeId) -> Option<ItemKind> {
        self.get(id).map(CfgNode::kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(CfgNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(CfgNode::children).unwrap_or(&[])
    }

    /// Position of `id` in its parent's child list, `None` for a root
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    pub fn find_child<F>(&self, parent: NodeId, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&CfgNode) -> bool,
    {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.get(*c).is_some_and(&mut pred))
    }

    /// All nodes below `id` in pre-order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Child indices from the root down to `id`; sorting by this key gives tree order
    pub fn path_key(&self, id: NodeId) -> Vec<usize> {
        let mut key = Vec::new();
        let mut current = id;
        while let Some(index) = self.index_of(current) {
            key.push(index);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        key.reverse();
        key
    }

    /// True if `ancestor` is `id` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Number of detected invariant violations since creation
    pub fn integrity_faults(&self) -> u32 {
        self.integrity_faults
    }

    /// Row at which a node lands when inserted under `parent` after `before`.
    ///
    /// `before == parent` means first; a `before` not found in the list falls
    /// back to appending and is reported.
    pub(crate) fn insertion_index(&self, parent: NodeId, before: Option<NodeId>) -> usize {
        let children = self.children(parent);
        match before {
            None => children.len(),
            Some(before) if before == parent => 0,
            Some(before) => match children.iter().position(|c| *c == before) {
                Some(index) => index + 1,
                None => {
                    tracing::error!(
                        "Insert: sibling {} not found under {}, appending",
                        before,
                        parent
                    );
                    children.len()
                }
            },
        }
    }

    /// Link a detached node into `parent` at `index`
    pub(crate) fn link_at(&mut self, parent: NodeId, child: NodeId, index: usize) {
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
            node.state = NodeState::Inserted;
        }
        if let Some(parent_node) = self.get_mut(parent) {
            let index = index.min(parent_node.children.len());
            parent_node.children.insert(index, child);
        }
    }

    /// Remove `child` from `parent`'s list without destroying it
    pub(crate) fn take_child_from_list(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(parent_node) = self.get_mut(parent) else {
            tracing::warn!("Take child: parent {} does not exist", parent);
            return false;
        };
        match parent_node.children.iter().position(|c| *c == child) {
            Some(index) => {
                parent_node.children.remove(index);
                true
            }
            None => {
                tracing::warn!("Take child: {} not found in child list of {}", child, parent);
                false
            }
        }
    }

    /// Release a node's slot.
    ///
    /// The prepare-delete pass must have run exactly once and the child list
    /// must be empty. Violations are diagnosed and the remaining children are
    /// released as well so nothing leaks.
    pub(crate) fn destroy(&mut self, id: NodeId) -> Option<CfgNode> {
        let node = self.nodes.get_mut(id.index())?.take()?;
        self.live -= 1;

        if node.prepare_delete_calls != 1 {
            tracing::error!(
                "Destroying {} ({}) with prepare-delete called {} times",
                id,
                node.kind,
                node.prepare_delete_calls
            );
            self.integrity_faults += 1;
        }

        if !node.children.is_empty() {
            tracing::error!(
                "Destroying {} ({}) with {} children left",
                id,
                node.kind,
                node.children.len()
            );
            self.integrity_faults += 1;
            for child in node.children.iter().rev() {
                if let Some(child_node) = self.get_mut(*child) {
                    child_node.prepare_delete_calls = 1;
                    child_node.children.clear();
                }
                self.destroy(*child);
            }
        }

        if let Some(parent) = node.parent
            && self.children(parent).contains(&id)
        {
            tracing::error!("Destroying {} while still listed under {}", id, parent);
            self.integrity_faults += 1;
            self.take_child_from_list(parent, id);
        }

        Some(node)
    }
}
