//! The workspace: owner of the configuration tree.
//!
//! [`Workspace`] holds the arena, the view notifier and the host
//! collaborators. All structural changes go through it so that every
//! mutation is announced to the view inside a bracket and every removed
//! node gets its per-kind cleanup exactly once.
//!
//! The operations are split by subtree:
//! - `filters`: filter files, filter items, quick search
//! - `bookmarks`: ordered bookmark list
//! - `logs`: the single log entry
//! - `plugins`: plugin libraries with their decoders and plots
//! - `menu`: context menus and double click
//! - `writer`: the tag based file representation

pub mod bookmarks;
pub mod filters;
pub mod logs;
pub mod menu;
pub mod plugins;
pub mod writer;

pub use menu::{MenuAction, MenuEntry};

use crate::host::Host;
use crate::tree::{CfgNode, ConfigTree, ItemKind, ItemStatus, NodeId, NodeState, Payload};
use crate::view::{LifecyclePhase, ViewNotifier, ViewSink};
use camino::{Utf8Path, Utf8PathBuf};
use std::rc::Rc;

/// Name of the tree root
pub const ROOT_NAME: &str = "Workspace";

/// UI session state handed to the workspace by the view layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Kind of the most recently selected node
    pub last_selection_kind: Option<ItemKind>,
    /// Filter of the most recent filter or filter item selection
    pub last_filter: Option<NodeId>,
}

pub struct Workspace {
    tree: ConfigTree,
    notifier: Rc<ViewNotifier>,
    host: Host,
    root: NodeId,
    filters: NodeId,
    plugins: NodeId,
    logs: NodeId,
    comments: NodeId,
    bookmarks: NodeId,
    workspace_file: Option<Utf8PathBuf>,
    selection_enabled: bool,
    session: SessionContext,
}

impl Workspace {
    /// Create a workspace with the fixed top level skeleton
    pub fn new(host: Host, sink: Box<dyn ViewSink>) -> Self {
        let notifier = ViewNotifier::new(sink);
        let mut tree = ConfigTree::new();
        let root = tree.alloc(CfgNode::container(ItemKind::Root, ROOT_NAME));
        if let Some(node) = tree.get_mut(root) {
            node.state = NodeState::Inserted;
        }

        let mut workspace = Self {
            tree,
            notifier,
            host,
            root,
            filters: root,
            plugins: root,
            logs: root,
            comments: root,
            bookmarks: root,
            workspace_file: None,
            selection_enabled: true,
            session: SessionContext::default(),
        };
        workspace.fill_workspace();
        workspace
    }

    fn fill_workspace(&mut self) {
        let root = self.root;
        self.filters = self.insert_node(CfgNode::container(ItemKind::FilterRoot, "Filters"), root, None, false);
        self.plugins = self.insert_node(
            CfgNode::container(ItemKind::PlugInRoot, "Plugins").with_status(ItemStatus::DISABLED),
            root,
            None,
            false,
        );
        self.logs = self.insert_node(CfgNode::container(ItemKind::LogRoot, "Logs"), root, None, false);
        self.comments = self.insert_node(
            CfgNode::container(ItemKind::CommentRoot, "Comments").with_status(ItemStatus::DISABLED),
            root,
            None,
            false,
        );
        self.bookmarks = self.insert_node(CfgNode::container(ItemKind::BookmarkRoot, "Bookmarks"), root, None, false);
        tracing::debug!("Workspace skeleton created");
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&CfgNode> {
        self.tree.get(id)
    }

    pub fn notifier(&self) -> &Rc<ViewNotifier> {
        &self.notifier
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn filters_root(&self) -> NodeId {
        self.filters
    }

    pub fn plugins_root(&self) -> NodeId {
        self.plugins
    }

    pub fn logs_root(&self) -> NodeId {
        self.logs
    }

    pub fn comments_root(&self) -> NodeId {
        self.comments
    }

    pub fn bookmarks_root(&self) -> NodeId {
        self.bookmarks
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub fn workspace_file(&self) -> Option<&Utf8Path> {
        self.workspace_file.as_deref()
    }

    pub fn set_workspace_file(&mut self, path: Option<Utf8PathBuf>) {
        self.workspace_file = path;
    }

    /// Enable or disable selecting freshly inserted nodes. Returns the previous value.
    pub fn set_selection_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.selection_enabled, enabled)
    }

    pub fn selection_enabled(&self) -> bool {
        self.selection_enabled
    }

    /// Allocate `node` and insert it under `parent` after `before`.
    ///
    /// `before == Some(parent)` inserts first, `None` appends.
    pub fn insert_node(&mut self, node: CfgNode, parent: NodeId, before: Option<NodeId>, select: bool) -> NodeId {
        let id = self.tree.alloc(node);
        let index = self.tree.insertion_index(parent, before);
        self.attach(id, parent, index, select);
        id
    }

    /// Allocate `node` and insert it under `parent` at `index` (clamped to the child count)
    pub fn insert_node_at(&mut self, node: CfgNode, parent: NodeId, index: usize, select: bool) -> NodeId {
        let id = self.tree.alloc(node);
        let index = index.min(self.tree.children(parent).len());
        self.attach(id, parent, index, select);
        id
    }

    fn attach(&mut self, id: NodeId, parent: NodeId, index: usize, select: bool) {
        {
            let _bracket = self.notifier.insert_rows(parent, index, 1);
            self.tree.link_at(parent, id, index);
        }

        if select && self.selection_enabled {
            self.host.selection.unselect_all();
            self.host.selection.select(id);
        }
    }

    /// Children first cleanup of a node that is about to be destroyed
    fn prepare_delete(&mut self, id: NodeId) {
        let Some(node) = self.tree.get_mut(id) else {
            tracing::error!("Prepare delete: node {} does not exist", id);
            return;
        };
        node.prepare_delete_calls += 1;
        node.state = NodeState::PrepareDeleteCalled;
        let kind = node.kind;
        let parent = node.parent;
        let remove_from_parent = node.remove_from_parent;
        let payload = node.payload.clone();

        if !self.notifier.is_shutting_down() {
            match &payload {
                Payload::Bookmark { row, .. } => self.host.document.start_one_line_filtering(*row, true),
                Payload::Log { path } => {
                    tracing::info!("Closing log {}", path);
                    self.host.document.clean_db(false);
                }
                Payload::Decoder { name } => self.host.document.remove_decoder(name),
                Payload::Plot { name } => self.host.plugins.detach_plot(name),
                _ => {}
            }
        }

        self.clear_children(id);

        if remove_from_parent && let Some(parent) = parent {
            self.tree.take_child_from_list(parent, id);
        }

        if let Payload::Plugin(handle) = &payload {
            tracing::info!("Unloading plugin {}", handle.path);
            self.host.plugins.unload(handle);
        }

        if self.session.last_filter == Some(id) {
            self.session.last_filter = None;
        }
        tracing::debug!("Prepared delete of {} ({})", id, kind);
    }

    /// Remove every child of `id`. Fixed containers among the children stay
    /// and are emptied instead; without any, this is a single remove bracket.
    pub fn remove_all_children(&mut self, id: NodeId) {
        let (fixed, removable): (Vec<NodeId>, Vec<NodeId>) = self
            .tree
            .children(id)
            .iter()
            .partition(|child| self.tree.get(**child).is_some_and(|n| n.always_exists));
        if fixed.is_empty() {
            self.clear_children(id);
            return;
        }

        for child in removable.into_iter().rev() {
            self.delete_item(child);
        }
        for child in fixed {
            self.remove_all_children(child);
        }
    }

    /// Destroy every child of `id` inside one remove bracket, fixed or not
    fn clear_children(&mut self, id: NodeId) {
        let children = self.tree.children(id).to_vec();
        if children.is_empty() {
            return;
        }

        for child in &children {
            if let Some(node) = self.tree.get_mut(*child) {
                node.remove_from_parent = false;
            }
        }

        let _bracket = self.notifier.remove_rows(id, 0, children.len());
        for child in &children {
            self.prepare_delete(*child);
        }

        while let Some(child) = self.tree.get_mut(id).and_then(|n| n.children.pop()) {
            self.tree.destroy(child);
        }
    }

    /// Delete a node and its subtree. Fixed containers and stale ids are rejected.
    pub fn delete_item(&mut self, id: NodeId) -> bool {
        let Some(node) = self.tree.get(id) else {
            tracing::warn!("Delete: node {} does not exist", id);
            return false;
        };
        if node.always_exists {
            tracing::warn!("Delete: {} ({}) can't be removed", id, node.kind);
            return false;
        }

        match (node.parent, self.tree.index_of(id)) {
            (Some(parent), Some(index)) => {
                let _bracket = self.notifier.remove_rows(parent, index, 1);
                self.prepare_delete(id);
            }
            _ => self.prepare_delete(id),
        }

        self.tree.destroy(id);
        true
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(node) = self.tree.get_mut(id) {
            node.text = text.into();
            self.notifier.item_changed(id);
        }
    }

    pub(crate) fn set_status_bit(&mut self, id: NodeId, bit: ItemStatus, on: bool) {
        if let Some(node) = self.tree.get_mut(id) {
            if on {
                node.status.insert(bit);
            } else {
                node.status.remove(bit);
            }
            self.notifier.item_changed(id);
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut CfgNode> {
        self.tree.get_mut(id)
    }

    /// "Workspace", followed by the workspace file name when one is set
    pub fn update_root_name(&mut self) {
        let name = match self.workspace_file.as_deref().and_then(Utf8Path::file_name) {
            Some(file) => format!("{} - {}", ROOT_NAME, file),
            None => ROOT_NAME.to_string(),
        };
        self.set_text(self.root, name);
    }

    /// Live selected nodes, optionally restricted to one kind, in selection order
    pub fn selection(&self, kind: Option<ItemKind>) -> Vec<NodeId> {
        self.host
            .selection
            .selected()
            .into_iter()
            .filter(|id| match self.tree.kind(*id) {
                Some(k) => kind.is_none_or(|wanted| wanted == k),
                None => false,
            })
            .collect()
    }

    /// Record a selection change in the session
    pub fn on_selection(&mut self, id: NodeId) {
        let Some(kind) = self.tree.kind(id) else {
            return;
        };
        self.session.last_selection_kind = Some(kind);
        match kind {
            ItemKind::Filter => self.session.last_filter = Some(id),
            ItemKind::FilterItem => self.session.last_filter = self.tree.parent(id),
            _ => {}
        }
    }

    pub fn unselect_all(&mut self) {
        self.host.selection.unselect_all();
    }

    /// Stop forwarding view notifications and expensive cleanup
    pub fn begin_shutdown(&mut self) {
        self.notifier.set_phase(LifecyclePhase::ShuttingDown);
    }

    /// Tear down the whole tree. Returns the number of integrity faults seen.
    pub fn shutdown(mut self) -> u32 {
        if !self.notifier.is_shutting_down() {
            self.begin_shutdown();
        }
        let root = self.root;
        self.clear_children(root);
        if let Some(node) = self.tree.get_mut(root) {
            node.prepare_delete_calls += 1;
            node.state = NodeState::PrepareDeleteCalled;
        }
        self.tree.destroy(root);

        let faults = self.tree.integrity_faults();
        tracing::info!(
            "Workspace shut down, {} nodes left, {} integrity faults",
            self.tree.len(),
            faults
        );
        faults
    }

    /// Render the tree as indented text, one node per line
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        if let Some(node) = self.tree.get(id) {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.text);
            out.push('\n');
            for child in node.children() {
                self.dump_node(*child, depth + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::host::SelectionSource;
    use crate::view::{RecordingViewSink, ViewEvent};
    use proptest::prelude::*;

    fn workspace() -> (Workspace, HeadlessHost, RecordingViewSink) {
        let host = HeadlessHost::new();
        let sink = RecordingViewSink::new();
        let ws = Workspace::new(host.host(), Box::new(sink.clone()));
        sink.clear();
        (ws, host, sink)
    }

    fn comment(ws: &mut Workspace, parent: NodeId, text: &str) -> NodeId {
        ws.insert_node(CfgNode::new(ItemKind::Comment, text, Payload::Comment), parent, None, false)
    }

    #[test]
    fn test_skeleton() {
        let (ws, _host, _sink) = workspace();
        let names: Vec<&str> = ws
            .tree()
            .children(ws.root())
            .iter()
            .map(|id| ws.node(*id).unwrap().text())
            .collect();
        assert_eq!(names, vec!["Filters", "Plugins", "Logs", "Comments", "Bookmarks"]);
        for id in ws.tree().children(ws.root()) {
            assert!(ws.node(*id).unwrap().always_exists());
        }
        assert!(ws.node(ws.plugins_root()).unwrap().status().contains(ItemStatus::DISABLED));
    }

    #[test]
    fn test_insert_is_bracketed() {
        let (mut ws, _host, sink) = workspace();
        let comments = ws.comments_root();
        comment(&mut ws, comments, "a");
        comment(&mut ws, comments, "b");
        assert_eq!(
            sink.events(),
            vec![
                ViewEvent::BeginInsert {
                    parent: comments,
                    first: 0,
                    count: 1
                },
                ViewEvent::EndInsert,
                ViewEvent::BeginInsert {
                    parent: comments,
                    first: 1,
                    count: 1
                },
                ViewEvent::EndInsert,
            ]
        );
    }

    #[test]
    fn test_insert_selects_when_enabled() {
        let (mut ws, host, _sink) = workspace();
        let comments = ws.comments_root();
        let id = ws.insert_node(CfgNode::new(ItemKind::Comment, "c", Payload::Comment), comments, None, true);
        assert_eq!(host.selection.selected(), vec![id]);

        ws.set_selection_enabled(false);
        ws.insert_node(CfgNode::new(ItemKind::Comment, "d", Payload::Comment), comments, None, true);
        assert_eq!(host.selection.selected(), vec![id]);
    }

    #[test]
    fn test_delete_always_exists_rejected() {
        let (mut ws, _host, sink) = workspace();
        let filters = ws.filters_root();
        assert!(!ws.delete_item(filters));
        assert!(ws.tree().contains(filters));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_delete_subtree() {
        let (mut ws, _host, sink) = workspace();
        let comments = ws.comments_root();
        let parent = comment(&mut ws, comments, "p");
        let child = comment(&mut ws, parent, "c");
        sink.clear();

        assert!(ws.delete_item(parent));
        assert!(!ws.tree().contains(parent));
        assert!(!ws.tree().contains(child));
        assert!(ws.tree().children(comments).is_empty());
        assert_eq!(ws.tree().integrity_faults(), 0);
        assert_eq!(
            sink.events(),
            vec![
                ViewEvent::BeginRemove {
                    parent: comments,
                    first: 0,
                    count: 1
                },
                ViewEvent::EndRemove
            ]
        );
        assert!(!ws.delete_item(parent));
    }

    #[test]
    fn test_remove_all_children_of_root_keeps_containers() {
        let (mut ws, _host, _sink) = workspace();
        let root = ws.root();
        let filters = ws.filters_root();
        let comments = ws.comments_root();
        ws.create_cfg_filter(None);
        comment(&mut ws, comments, "note");

        ws.remove_all_children(root);

        assert_eq!(ws.tree().children(root).len(), 5);
        assert!(ws.tree().contains(filters));
        assert!(ws.filter_nodes().is_empty());
        assert!(ws.tree().children(comments).is_empty());

        let filter = ws.create_cfg_filter(None);
        assert_eq!(ws.node(filter).unwrap().parent(), Some(filters));
        assert_eq!(ws.filter_nodes(), vec![filter]);
    }

    #[test]
    fn test_remove_all_children_single_bracket() {
        let (mut ws, _host, sink) = workspace();
        let comments = ws.comments_root();
        for name in ["a", "b", "c"] {
            comment(&mut ws, comments, name);
        }
        sink.clear();

        ws.remove_all_children(comments);
        assert_eq!(
            sink.events(),
            vec![
                ViewEvent::BeginRemove {
                    parent: comments,
                    first: 0,
                    count: 3
                },
                ViewEvent::EndRemove
            ]
        );
        assert_eq!(ws.tree().integrity_faults(), 0);
    }

    #[test]
    fn test_root_name() {
        let (mut ws, _host, _sink) = workspace();
        ws.set_workspace_file(Some(Utf8PathBuf::from("/ws/dir/work.lsz")));
        ws.update_root_name();
        assert_eq!(ws.node(ws.root()).unwrap().text(), "Workspace - work.lsz");
        ws.set_workspace_file(None);
        ws.update_root_name();
        assert_eq!(ws.node(ws.root()).unwrap().text(), "Workspace");
    }

    #[test]
    fn test_selection_filters_kind_and_stale_ids() {
        let (mut ws, host, _sink) = workspace();
        let comments = ws.comments_root();
        let a = comment(&mut ws, comments, "a");
        let b = comment(&mut ws, comments, "b");
        host.selection.set(&[ws.filters_root(), a, b]);
        ws.delete_item(b);

        assert_eq!(ws.selection(Some(ItemKind::Comment)), vec![a]);
        assert_eq!(ws.selection(None), vec![ws.filters_root(), a]);
    }

    #[test]
    fn test_shutdown_is_silent_and_clean() {
        let (mut ws, _host, sink) = workspace();
        let comments = ws.comments_root();
        comment(&mut ws, comments, "a");
        sink.clear();

        ws.begin_shutdown();
        assert_eq!(ws.shutdown(), 0);
        assert!(sink.events().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Delete(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..64).prop_map(Op::Add),
            (0usize..64).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn test_random_trees_delete_cleanly(ops in proptest::collection::vec(op(), 1..60)) {
            let (mut ws, _host, _sink) = workspace();
            let comments = ws.comments_root();
            let mut live: Vec<NodeId> = vec![comments];

            for op in ops {
                match op {
                    Op::Add(pick) => {
                        let parent = live[pick % live.len()];
                        let id = comment(&mut ws, parent, "n");
                        live.push(id);
                    }
                    Op::Delete(pick) => {
                        let target = live[pick % live.len()];
                        let parent = ws.tree().parent(target);
                        let subtree = ws.tree().descendants(target);
                        let deleted = ws.delete_item(target);
                        prop_assert_eq!(deleted, target != comments);
                        if deleted {
                            prop_assert!(!ws.tree().children(parent.unwrap()).contains(&target));
                            for gone in subtree.iter().chain(std::iter::once(&target)) {
                                prop_assert!(!ws.tree().contains(*gone));
                            }
                        }
                        live.retain(|id| ws.tree().contains(*id));
                    }
                }
            }

            prop_assert_eq!(ws.tree().integrity_faults(), 0);
            prop_assert_eq!(ws.notifier().protocol_violations(), 0);
        }
    }
}
