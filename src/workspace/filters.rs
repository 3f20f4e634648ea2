//! Filter files and filter items under the Filters container.

use super::Workspace;
use crate::models::{Filter, FilterItem};
use crate::tree::{CfgNode, ItemKind, ItemStatus, NodeId, Payload};
use camino::Utf8Path;

/// Node wrapping a filter item; disabled items get the Disabled status
pub(crate) fn filter_item_node(item: FilterItem) -> CfgNode {
    let status = if item.enabled {
        ItemStatus::NONE
    } else {
        ItemStatus::DISABLED
    };
    let text = item.text().into_owned();
    CfgNode::new(ItemKind::FilterItem, text, Payload::FilterItem(item)).with_status(status)
}

impl Workspace {
    /// Filter nodes in tree order
    pub fn filter_nodes(&self) -> Vec<NodeId> {
        self.tree
            .children(self.filters)
            .iter()
            .copied()
            .filter(|id| self.tree.kind(*id) == Some(ItemKind::Filter))
            .collect()
    }

    /// Filter item nodes of one filter
    pub fn filter_item_nodes(&self, filter: NodeId) -> Vec<NodeId> {
        self.tree
            .children(filter)
            .iter()
            .copied()
            .filter(|id| self.tree.kind(*id) == Some(ItemKind::FilterItem))
            .collect()
    }

    /// All filter items of all filters, in tree order
    pub fn all_filter_items(&self) -> impl Iterator<Item = (NodeId, &FilterItem)> + '_ {
        self.filter_nodes().into_iter().flat_map(move |filter| {
            self.tree
                .children(filter)
                .iter()
                .filter_map(move |id| self.tree.get(*id).and_then(CfgNode::filter_item).map(|item| (*id, item)))
        })
    }

    /// Wrap a filter in a new node under Filters; a placeholder filter is used without one
    pub fn create_cfg_filter(&mut self, filter: Option<Filter>) -> NodeId {
        let filter = filter.unwrap_or_else(Filter::placeholder);
        if self.selection_enabled() {
            self.unselect_all();
        }
        let name = filter.short_name().to_string();
        let id = self
            .tree
            .alloc(CfgNode::new(ItemKind::Filter, name, Payload::Filter(filter)));
        self.insert_filter(id, false);
        id
    }

    /// Link a filter node (unless `reinsert`) and move its pending items into child nodes
    pub fn insert_filter(&mut self, id: NodeId, reinsert: bool) {
        if !reinsert {
            let filters = self.filters;
            let index = self.tree.children(filters).len();
            self.attach(id, filters, index, true);
        }

        let Some(filter) = self.tree.get_mut(id).and_then(CfgNode::filter_mut) else {
            tracing::error!("Insert filter: {} is not a filter", id);
            return;
        };
        let short_name = filter.short_name().to_string();
        let items = filter.take_items();

        self.set_text(id, short_name);
        let count = items.len();
        for item in items {
            self.insert_node(filter_item_node(item), id, None, false);
        }
        tracing::debug!("Inserted filter {} with {} items", id, count);
    }

    /// Change the file name of a filter node and show the new short name
    pub fn set_filter_file_name(&mut self, id: NodeId, path: &Utf8Path) {
        let Some(filter) = self.tree.get_mut(id).and_then(CfgNode::filter_mut) else {
            return;
        };
        filter.set_file_name(path);
        let short_name = filter.short_name().to_string();
        self.set_text(id, short_name);
    }

    /// Copy of a filter node's filter, with its items collected from the child nodes
    pub fn filter_snapshot(&self, id: NodeId) -> Option<Filter> {
        let mut filter = self.tree.get(id)?.filter()?.clone();
        for child in self.tree.children(id) {
            if let Some(item) = self.tree.get(*child).and_then(CfgNode::filter_item) {
                filter.push_item(item.clone());
            }
        }
        Some(filter)
    }

    /// Create a filter item or edit an existing one through the properties dialog.
    ///
    /// The target filter of a new item is, in order: `parent` (a filter, or the
    /// filter of a filter item), the first selected filter, the filter of the
    /// last filter selection, the first filter, or a new filter. Returns `None`
    /// on cancel; a cancelled new item is discarded.
    pub fn add_filter_item(
        &mut self,
        text: Option<&str>,
        existing: Option<NodeId>,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let draft = match existing {
            Some(id) => match self.tree.get(id).and_then(CfgNode::filter_item) {
                Some(item) => item.clone(),
                None => {
                    tracing::warn!("Filter item properties: {} is not a filter item", id);
                    return None;
                }
            },
            None => FilterItem::new(text.unwrap_or("")),
        };

        let Some(mut edited) = self.host.prompt.edit_filter_item(&draft) else {
            tracing::debug!("Filter item dialog cancelled");
            return None;
        };

        let id = match existing {
            Some(id) => {
                if let Some(item) = self.tree.get_mut(id).and_then(CfgNode::filter_item_mut) {
                    edited.unique_id = item.unique_id;
                    edited.quick_search = item.quick_search;
                    *item = edited;
                }
                id
            }
            None => {
                edited.unique_id = draft.unique_id;
                edited.quick_search = None;
                let target = self.target_filter(parent);
                self.insert_node(filter_item_node(edited), target, None, true)
            }
        };

        self.refresh_filter_item(id);
        Some(id)
    }

    fn target_filter(&mut self, parent: Option<NodeId>) -> NodeId {
        if let Some(parent) = parent {
            match self.tree.kind(parent) {
                Some(ItemKind::Filter) => return parent,
                Some(ItemKind::FilterItem) => {
                    if let Some(filter) = self.tree.parent(parent) {
                        return filter;
                    }
                }
                other => tracing::warn!("Add filter item: {} ({:?}) is not a filter", parent, other),
            }
        }

        if let Some(selected) = self.selection(Some(ItemKind::Filter)).first() {
            return *selected;
        }

        if let Some(last) = self.session.last_filter
            && self.tree.kind(last) == Some(ItemKind::Filter)
        {
            return last;
        }

        match self.filter_nodes().first() {
            Some(first) => *first,
            None => self.create_cfg_filter(None),
        }
    }

    /// Push a filter item's state to its node text, status and the document
    fn refresh_filter_item(&mut self, id: NodeId) {
        let Some(item) = self.tree.get(id).and_then(CfgNode::filter_item) else {
            return;
        };
        let text = item.text().into_owned();
        let enabled = item.enabled;
        let (unique_id, color, bg_color) = (item.unique_id, item.color, item.bg_color);

        self.set_text(id, text);
        self.set_status_bit(id, ItemStatus::DISABLED, !enabled);
        self.host.document.update_filter_item(unique_id, color, bg_color);
    }

    pub fn set_filter_item_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(item) = self.tree.get_mut(id).and_then(CfgNode::filter_item_mut) {
            item.enabled = enabled;
            self.refresh_filter_item(id);
        }
    }

    /// Enable or disable every item of a filter
    pub fn enable_filter(&mut self, filter: NodeId, enabled: bool) {
        for id in self.filter_item_nodes(filter) {
            self.set_filter_item_enabled(id, enabled);
        }
    }

    /// First filter item with the given unique id
    pub fn find_filter_item(&self, unique_id: u32) -> Option<NodeId> {
        self.all_filter_items()
            .find(|(_, item)| item.unique_id == unique_id)
            .map(|(id, _)| id)
    }

    pub fn disable_filter_item(&mut self, unique_id: u32) -> bool {
        match self.find_filter_item(unique_id) {
            Some(id) => {
                self.set_filter_item_enabled(id, false);
                true
            }
            None => false,
        }
    }

    /// Open the properties dialog of the filter item with the given unique id
    pub fn filter_item_properties(&mut self, unique_id: u32) -> Option<NodeId> {
        let id = self.find_filter_item(unique_id)?;
        self.add_filter_item(None, Some(id), None)
    }

    pub fn enabled_filter_item_count(&self) -> usize {
        self.all_filter_items().filter(|(_, item)| item.enabled).count()
    }

    /// Filter items whose text contains `text`, ignoring case
    pub fn matching_filters(&self, text: &str) -> Vec<NodeId> {
        let needle = text.to_lowercase();
        self.all_filter_items()
            .filter(|(_, item)| item.text().to_lowercase().contains(&needle))
            .map(|(id, _)| id)
            .collect()
    }

    /// Packed fields of every filter item in tree order
    pub fn filters_hash(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, item) in self.all_filter_items() {
            item.pack_fields(&mut out);
        }
        out
    }

    /// Bind `key` to the single selected filter item, clearing any other holder
    pub fn set_quick_search(&mut self, key: char) -> bool {
        let selected = self.selection(Some(ItemKind::FilterItem));
        let [target] = selected.as_slice() else {
            tracing::warn!("Quick search: select exactly one filter item ({} selected)", selected.len());
            return false;
        };
        let target = *target;

        let holders: Vec<NodeId> = self
            .all_filter_items()
            .filter(|(_, item)| item.quick_search == Some(key))
            .map(|(id, _)| id)
            .collect();
        for id in holders {
            if let Some(item) = self.tree.get_mut(id).and_then(CfgNode::filter_item_mut) {
                item.quick_search = None;
            }
        }

        if let Some(item) = self.tree.get_mut(target).and_then(CfgNode::filter_item_mut) {
            item.quick_search = Some(key);
            tracing::info!("Quick search {} bound to {}", key, target);
        }
        true
    }

    /// Search the log for the text of the filter item bound to `key`
    pub fn quick_search(&mut self, key: char, forward: bool) -> bool {
        let Some(item) = self
            .all_filter_items()
            .find(|(_, item)| item.quick_search == Some(key))
            .map(|(_, item)| item.clone())
        else {
            tracing::debug!("No filter item bound to quick search {}", key);
            return false;
        };

        self.host
            .document
            .quick_search(&item.text(), forward, item.case_sensitive, item.regex);
        true
    }

    /// Filter or plugin node loaded from `path`
    pub fn get_cfg_item(&self, path: &Utf8Path) -> Option<NodeId> {
        self.filter_nodes()
            .into_iter()
            .find(|id| {
                self.tree
                    .get(*id)
                    .and_then(CfgNode::filter)
                    .is_some_and(|f| f.file_name() == path)
            })
            .or_else(|| {
                self.tree.children(self.plugins).iter().copied().find(|id| {
                    self.tree
                        .get(*id)
                        .and_then(CfgNode::plugin)
                        .is_some_and(|p| p.path() == path)
                })
            })
    }

    /// Remove every filter
    pub fn clear_filters(&mut self) {
        let filters = self.filters;
        self.remove_all_children(filters);
    }
}
