use super::id::NodeId;
use super::kind::{ItemKind, ItemStatus};
use crate::models::{Filter, FilterItem, PluginHandle};
use camino::Utf8PathBuf;

/// Kind specific data owned by a node
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Containers and other nodes without data of their own
    Empty,
    Filter(Filter),
    FilterItem(FilterItem),
    Log { path: Utf8PathBuf },
    Bookmark { row: usize, comment: String },
    Plugin(PluginHandle),
    Decoder { name: String },
    Plot { name: String },
    SubPlot { name: String, sequence: bool },
    Graph { name: String, enabled: bool },
    SequenceDiagram { name: String, enabled: bool },
    Comment,
}

/// Where a node is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Constructed,
    Inserted,
    PrepareDeleteCalled,
}

/// A configuration item: shared fields plus a [`Payload`]
#[derive(Debug, Clone)]
pub struct CfgNode {
    pub(crate) kind: ItemKind,
    pub(crate) text: String,
    pub(crate) status: ItemStatus,
    pub(crate) always_exists: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) remove_from_parent: bool,
    pub(crate) prepare_delete_calls: u32,
    pub(crate) state: NodeState,
    pub payload: Payload,
}

impl CfgNode {
    pub fn new(kind: ItemKind, text: impl Into<String>, payload: Payload) -> Self {
        Self {
            kind,
            text: text.into(),
            status: ItemStatus::NONE,
            always_exists: false,
            parent: None,
            children: Vec::new(),
            remove_from_parent: true,
            prepare_delete_calls: 0,
            state: NodeState::Constructed,
            payload,
        }
    }

    /// A fixed container that rejects deletion
    pub fn container(kind: ItemKind, text: &str) -> Self {
        let mut node = Self::new(kind, text, Payload::Empty);
        node.always_exists = true;
        node
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn always_exists(&self) -> bool {
        self.always_exists
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn filter(&self) -> Option<&Filter> {
        match &self.payload {
            Payload::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn filter_mut(&mut self) -> Option<&mut Filter> {
        match &mut self.payload {
            Payload::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn filter_item(&self) -> Option<&FilterItem> {
        match &self.payload {
            Payload::FilterItem(item) => Some(item),
            _ => None,
        }
    }

    pub fn filter_item_mut(&mut self) -> Option<&mut FilterItem> {
        match &mut self.payload {
            Payload::FilterItem(item) => Some(item),
            _ => None,
        }
    }

    pub fn plugin(&self) -> Option<&PluginHandle> {
        match &self.payload {
            Payload::Plugin(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn bookmark_row(&self) -> Option<usize> {
        match &self.payload {
            Payload::Bookmark { row, .. } => Some(*row),
            _ => None,
        }
    }
}
