use std::fmt;

/// Stable handle of a node in the [`ConfigTree`](super::ConfigTree) arena.
///
/// Slots are never reused, so a stale id of a destroyed node can never
/// alias a newer node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Get the arena slot index of this node
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw numeric value, used as the transfer identity token
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node#{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
