//! Context menus of the tree.
//!
//! A menu is built from the current selection and dispatched on the kind of
//! the first selected node. Entries carry a [`MenuAction`]; the actions that
//! only touch the tree run in [`Workspace::perform`], file actions need the
//! [`ConfigurationController`](crate::services::ConfigurationController).

use super::Workspace;
use crate::models::SupportedFeatures;
use crate::tree::{CfgNode, ItemKind, NodeId, Payload};
use camino::{Utf8Path, Utf8PathBuf};

/// Marker of filter files that belong to the default workspace
pub const DEFAULT_FILTER_MARKER: &str = "default_filter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    SaveWorkspace,
    SaveWorkspaceAs,
    SaveDefaultWorkspace,
    CloseWorkspace,
    OpenFolder(Utf8PathBuf),
    NewFilter,
    OpenFilterFile,
    AddFilterItem(Option<NodeId>),
    EnableFilters { nodes: Vec<NodeId>, enable: bool },
    ReloadFilter(NodeId),
    SaveFilter(NodeId),
    SaveFilterAs(NodeId),
    DeleteItems(Vec<NodeId>),
    ToggleFilterItems { nodes: Vec<NodeId>, enable: bool },
    FilterItemProperties(NodeId),
    GotoBookmark(usize),
    EditBookmark(NodeId),
    OpenLogFile,
    CloseLog,
    OpenPlugin,
    CloseAllPlugins,
    CloseSelectedPlugins,
    RunPlots(Vec<NodeId>),
    PluginInfo(NodeId),
    WebHelp(String),
    ToggleGraphs { nodes: Vec<NodeId>, enable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub enabled: bool,
    pub action: MenuAction,
}

impl MenuEntry {
    fn new(label: &str, enabled: bool, action: MenuAction) -> Self {
        Self {
            label: label.to_string(),
            enabled,
            action,
        }
    }
}

fn folder_of(path: &Utf8Path) -> Utf8PathBuf {
    path.parent().map(Utf8Path::to_path_buf).unwrap_or_default()
}

impl Workspace {
    /// Context menu for the current selection
    pub fn popup_menu(&self) -> Vec<MenuEntry> {
        let selection = self.selection(None);
        match selection.first().and_then(|id| self.tree.kind(*id)) {
            Some(kind) => self.popup_menu_for(kind, &selection),
            None => {
                tracing::debug!("Popup menu without selection");
                Vec::new()
            }
        }
    }

    /// Context menu of a `kind` handler; empty when the selection doesn't start with that kind
    pub fn popup_menu_for(&self, kind: ItemKind, selection: &[NodeId]) -> Vec<MenuEntry> {
        let Some(first) = selection.first().copied() else {
            tracing::warn!("Popup menu for {} with an empty selection", kind);
            return Vec::new();
        };
        let Some(node) = self.tree.get(first) else {
            tracing::warn!("Popup menu for stale node {}", first);
            return Vec::new();
        };
        if node.kind() != kind {
            tracing::warn!("Popup menu for {} called with a {} selection", kind, node.kind());
            return Vec::new();
        }

        let single = selection.len() == 1;
        match kind {
            ItemKind::Root => self.root_menu(),
            ItemKind::FilterRoot => vec![
                MenuEntry::new("New Filter File...", true, MenuAction::NewFilter),
                MenuEntry::new("Open Filter File...", true, MenuAction::OpenFilterFile),
                MenuEntry::new("Add filter item to Filter File...", true, MenuAction::AddFilterItem(None)),
            ],
            ItemKind::Filter => self.filter_menu(node, selection),
            ItemKind::FilterItem => self.filter_item_menu(node, selection),
            ItemKind::Bookmark => vec![
                MenuEntry::new(
                    "Go to",
                    single,
                    MenuAction::GotoBookmark(node.bookmark_row().unwrap_or_default()),
                ),
                MenuEntry::new("Edit...", single, MenuAction::EditBookmark(first)),
                MenuEntry::new("Remove", true, MenuAction::DeleteItems(selection.to_vec())),
            ],
            ItemKind::LogRoot => vec![MenuEntry::new("Open Log File...", true, MenuAction::OpenLogFile)],
            ItemKind::Log => {
                let folder = match &node.payload {
                    Payload::Log { path } => folder_of(path),
                    _ => Utf8PathBuf::new(),
                };
                vec![
                    MenuEntry::new("Close", true, MenuAction::CloseLog),
                    MenuEntry::new("Open containing folder", true, MenuAction::OpenFolder(folder)),
                ]
            }
            ItemKind::PlugInRoot => {
                let any = !node.children().is_empty();
                vec![
                    MenuEntry::new("Open Plugin...", true, MenuAction::OpenPlugin),
                    MenuEntry::new("Close all Plugins", any, MenuAction::CloseAllPlugins),
                    MenuEntry::new("Run All", any, MenuAction::RunPlots(vec![first])),
                ]
            }
            ItemKind::PlugIn => {
                let Some(handle) = node.plugin() else {
                    return Vec::new();
                };
                let has_help = handle.info.features.contains(SupportedFeatures::HELP_URL);
                vec![
                    MenuEntry::new("Info", single, MenuAction::PluginInfo(first)),
                    MenuEntry::new("Open containing folder", single, MenuAction::OpenFolder(folder_of(handle.path()))),
                    MenuEntry::new("Close", true, MenuAction::CloseSelectedPlugins),
                    MenuEntry::new("Web help", has_help, MenuAction::WebHelp(handle.info.help_url.clone())),
                    MenuEntry::new("Run All", true, MenuAction::RunPlots(selection.to_vec())),
                ]
            }
            ItemKind::PlotRoot => vec![MenuEntry::new(
                "Run all",
                !node.children().is_empty(),
                MenuAction::RunPlots(vec![first]),
            )],
            ItemKind::Plot => vec![MenuEntry::new("Run", true, MenuAction::RunPlots(selection.to_vec()))],
            ItemKind::Graph | ItemKind::SequenceDiagram => {
                let enabled = self.graph_enabled(first).unwrap_or(true);
                vec![MenuEntry::new(
                    if enabled { "Disable" } else { "Enable" },
                    true,
                    MenuAction::ToggleGraphs {
                        nodes: selection.to_vec(),
                        enable: !enabled,
                    },
                )]
            }
            _ => Vec::new(),
        }
    }

    fn root_menu(&self) -> Vec<MenuEntry> {
        let folder = self.workspace_file().map(folder_of);
        vec![
            MenuEntry::new("Save", true, MenuAction::SaveWorkspace),
            MenuEntry::new("Save As...", true, MenuAction::SaveWorkspaceAs),
            MenuEntry::new("Save As Default...", true, MenuAction::SaveDefaultWorkspace),
            MenuEntry::new(
                "Open containing folder",
                folder.is_some(),
                MenuAction::OpenFolder(folder.unwrap_or_default()),
            ),
            MenuEntry::new("Close", true, MenuAction::CloseWorkspace),
        ]
    }

    fn filter_menu(&self, node: &CfgNode, selection: &[NodeId]) -> Vec<MenuEntry> {
        let first = selection[0];
        let single = selection.len() == 1;
        let file_name = node.filter().map(|f| f.file_name().to_path_buf()).unwrap_or_default();
        let can_save = single && !file_name.as_str().contains(DEFAULT_FILTER_MARKER);

        vec![
            MenuEntry::new("Add filter item...", single, MenuAction::AddFilterItem(Some(first))),
            MenuEntry::new(
                "Enable All",
                true,
                MenuAction::EnableFilters {
                    nodes: selection.to_vec(),
                    enable: true,
                },
            ),
            MenuEntry::new(
                "Disable All",
                single,
                MenuAction::EnableFilters {
                    nodes: selection.to_vec(),
                    enable: false,
                },
            ),
            MenuEntry::new("Reload", single && file_name.is_file(), MenuAction::ReloadFilter(first)),
            MenuEntry::new("Save", can_save, MenuAction::SaveFilter(first)),
            MenuEntry::new("Save As...", single, MenuAction::SaveFilterAs(first)),
            MenuEntry::new(
                "Open containing folder...",
                single,
                MenuAction::OpenFolder(folder_of(&file_name)),
            ),
            MenuEntry::new("Delete", true, MenuAction::DeleteItems(selection.to_vec())),
        ]
    }

    fn filter_item_menu(&self, node: &CfgNode, selection: &[NodeId]) -> Vec<MenuEntry> {
        let uniform = selection
            .iter()
            .all(|id| self.tree.kind(*id) == Some(ItemKind::FilterItem));
        let enabled = node.filter_item().is_some_and(|item| item.enabled);

        vec![
            MenuEntry::new(
                if enabled { "Disable" } else { "Enable" },
                uniform,
                MenuAction::ToggleFilterItems {
                    nodes: selection.to_vec(),
                    enable: !enabled,
                },
            ),
            MenuEntry::new(
                "Properties",
                selection.len() == 1,
                MenuAction::FilterItemProperties(selection[0]),
            ),
            MenuEntry::new("Delete", uniform, MenuAction::DeleteItems(selection.to_vec())),
        ]
    }

    /// Run a menu action that only touches the tree.
    ///
    /// Returns false for file actions and for actions that didn't apply.
    pub fn perform(&mut self, action: &MenuAction) -> bool {
        match action {
            MenuAction::NewFilter => {
                self.create_cfg_filter(None);
                true
            }
            MenuAction::AddFilterItem(parent) => self.add_filter_item(None, None, *parent).is_some(),
            MenuAction::EnableFilters { nodes, enable } => {
                for id in nodes {
                    self.enable_filter(*id, *enable);
                }
                true
            }
            MenuAction::ToggleFilterItems { nodes, enable } => {
                for id in nodes {
                    self.set_filter_item_enabled(*id, *enable);
                }
                true
            }
            MenuAction::FilterItemProperties(id) => self.add_filter_item(None, Some(*id), None).is_some(),
            MenuAction::DeleteItems(nodes) => {
                let mut deleted = false;
                for id in nodes.iter().rev() {
                    deleted |= self.delete_item(*id);
                }
                deleted
            }
            MenuAction::GotoBookmark(row) => {
                self.host.document.goto_row(*row);
                true
            }
            MenuAction::EditBookmark(id) => self.edit_bookmark(*id),
            MenuAction::CloseLog => {
                self.remove_log();
                true
            }
            MenuAction::CloseAllPlugins => {
                self.close_all_plugins();
                true
            }
            MenuAction::CloseSelectedPlugins => {
                self.close_all_selected_plugins();
                true
            }
            MenuAction::RunPlots(nodes) => {
                let mut ran = 0;
                for id in nodes {
                    ran += self.run_all_plots(*id);
                }
                ran > 0
            }
            MenuAction::PluginInfo(id) => match self.plugin_info_text(*id) {
                Some(info) => {
                    self.host.prompt.show_info("Plugin info", &info);
                    true
                }
                None => false,
            },
            MenuAction::WebHelp(url) => {
                self.host.prompt.open_url(url);
                true
            }
            MenuAction::OpenFolder(folder) => {
                if folder.as_str().is_empty() {
                    return false;
                }
                self.host.prompt.open_url(folder.as_str());
                true
            }
            MenuAction::ToggleGraphs { nodes, enable } => {
                self.set_graphs_enabled(nodes, *enable);
                true
            }
            MenuAction::SaveWorkspace
            | MenuAction::SaveWorkspaceAs
            | MenuAction::SaveDefaultWorkspace
            | MenuAction::CloseWorkspace
            | MenuAction::OpenFilterFile
            | MenuAction::ReloadFilter(_)
            | MenuAction::SaveFilter(_)
            | MenuAction::SaveFilterAs(_)
            | MenuAction::OpenLogFile
            | MenuAction::OpenPlugin => {
                tracing::debug!("{:?} needs the configuration controller", action);
                false
            }
        }
    }

    /// Double click: filter items open their properties, bookmarks jump to their row
    pub fn double_click(&mut self, id: NodeId) -> bool {
        match self.tree.get(id).map(|n| &n.payload) {
            Some(Payload::FilterItem(_)) => self.add_filter_item(None, Some(id), None).is_some(),
            Some(Payload::Bookmark { row, .. }) => {
                let row = *row;
                self.host.document.goto_row(row);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::models::{Filter, FilterItem};
    use crate::view::NullViewSink;

    fn workspace() -> (Workspace, HeadlessHost) {
        let host = HeadlessHost::new();
        host.document.set_row_count(1000);
        (Workspace::new(host.host(), Box::new(NullViewSink)), host)
    }

    fn labels(menu: &[MenuEntry]) -> Vec<&str> {
        menu.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn test_empty_selection_gives_empty_menu() {
        let (ws, _host) = workspace();
        assert!(ws.popup_menu().is_empty());
        assert!(ws.popup_menu_for(ItemKind::Filter, &[]).is_empty());
    }

    #[test]
    fn test_kind_mismatch_gives_empty_menu() {
        let (ws, _host) = workspace();
        assert!(ws.popup_menu_for(ItemKind::Filter, &[ws.bookmarks_root()]).is_empty());
    }

    #[test]
    fn test_root_menu() {
        let (ws, host) = workspace();
        host.selection.set(&[ws.root()]);
        let menu = ws.popup_menu();
        assert_eq!(
            labels(&menu),
            vec!["Save", "Save As...", "Save As Default...", "Open containing folder", "Close"]
        );
        assert!(!menu[3].enabled);
    }

    #[test]
    fn test_filter_menu_enable_rules() {
        let (mut ws, host) = workspace();
        let a = ws.create_cfg_filter(Some(Filter::with_file_name("/nowhere/a.flt")));
        let b = ws.create_cfg_filter(None);

        host.selection.set(&[a, b]);
        let menu = ws.popup_menu();
        assert_eq!(menu.len(), 8);
        assert!(!menu[0].enabled);
        assert!(menu[1].enabled);
        assert!(!menu[2].enabled);
        assert!(!menu[3].enabled);

        host.selection.set(&[a]);
        let menu = ws.popup_menu();
        assert!(menu[2].enabled);
        assert!(menu[4].enabled);
        assert_eq!(menu[6].action, MenuAction::OpenFolder(Utf8PathBuf::from("/nowhere")));
    }

    #[test]
    fn test_filter_item_toggle() {
        let (mut ws, host) = workspace();
        let mut filter = Filter::with_file_name("x.flt");
        filter.push_item(FilterItem::new("a"));
        let id = ws.create_cfg_filter(Some(filter));
        let item = ws.filter_item_nodes(id)[0];

        host.selection.set(&[item]);
        let menu = ws.popup_menu();
        assert_eq!(labels(&menu), vec!["Disable", "Properties", "Delete"]);

        assert!(ws.perform(&menu[0].action));
        assert_eq!(ws.popup_menu()[0].label, "Enable");
        assert_eq!(ws.enabled_filter_item_count(), 0);
    }

    #[test]
    fn test_bookmark_menu_and_double_click() {
        let (mut ws, host) = workspace();
        let id = ws.add_bookmark("x", 42).unwrap();
        host.selection.set(&[id]);
        let menu = ws.popup_menu();
        assert_eq!(labels(&menu), vec!["Go to", "Edit...", "Remove"]);
        assert_eq!(menu[0].action, MenuAction::GotoBookmark(42));

        assert!(ws.double_click(id));
        assert_eq!(host.document.with_state(|s| s.goto_rows.clone()), vec![42]);

        assert!(ws.perform(&menu[2].action));
        assert!(!ws.is_bookmarked(42));
    }

    #[test]
    fn test_file_actions_need_controller() {
        let (mut ws, _host) = workspace();
        assert!(!ws.perform(&MenuAction::SaveWorkspace));
        assert!(!ws.perform(&MenuAction::OpenLogFile));
    }

    #[test]
    fn test_plugins_root_menu_disabled_when_empty() {
        let (ws, host) = workspace();
        host.selection.set(&[ws.plugins_root()]);
        let menu = ws.popup_menu();
        assert_eq!(labels(&menu), vec!["Open Plugin...", "Close all Plugins", "Run All"]);
        assert!(!menu[1].enabled);
    }
}
