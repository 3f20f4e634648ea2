//! Integration tests for workspace tree operations
//!
//! These tests verify:
//! - The fixed container layout of a new workspace
//! - Filters, filter items and bookmarks driven through menu actions
//! - Deleting items and shutting down the tree

use scrutinizer_workspace::headless::HeadlessHost;
use scrutinizer_workspace::view::NullViewSink;
use scrutinizer_workspace::{Filter, FilterItem, ItemKind, MenuAction, Workspace};

fn workspace(rows: usize) -> (Workspace, HeadlessHost) {
    let host = HeadlessHost::new();
    host.document.set_row_count(rows);
    (Workspace::new(host.host(), Box::new(NullViewSink)), host)
}

#[test]
fn test_new_workspace_layout() {
    let (ws, _host) = workspace(0);
    let root = ws.root();

    let kinds: Vec<ItemKind> = ws
        .tree()
        .children(root)
        .iter()
        .filter_map(|id| ws.tree().kind(*id))
        .collect();
    assert!(kinds.contains(&ItemKind::FilterRoot));
    assert!(kinds.contains(&ItemKind::PlugInRoot));
    assert!(kinds.contains(&ItemKind::LogRoot));
    assert!(kinds.contains(&ItemKind::BookmarkRoot));
    assert_eq!(ws.node(root).unwrap().text(), "Workspace");
}

#[test]
fn test_menu_driven_filter_editing() {
    let (mut ws, host) = workspace(0);

    assert!(ws.perform(&MenuAction::NewFilter));
    let filter = ws.filter_nodes()[0];

    host.prompt.queue_filter_edit(Some(FilterItem::new("timeout")));
    assert!(ws.perform(&MenuAction::AddFilterItem(Some(filter))));
    let item = ws.filter_item_nodes(filter)[0];
    assert_eq!(ws.node(item).unwrap().text(), "timeout");

    assert!(ws.perform(&MenuAction::ToggleFilterItems {
        nodes: vec![item],
        enable: false,
    }));
    assert_eq!(ws.enabled_filter_item_count(), 0);

    assert!(ws.perform(&MenuAction::EnableFilters {
        nodes: vec![filter],
        enable: true,
    }));
    assert_eq!(ws.enabled_filter_item_count(), 1);

    assert!(ws.perform(&MenuAction::DeleteItems(vec![filter])));
    assert!(ws.filter_nodes().is_empty());
    assert!(!ws.tree().contains(item));
}

#[test]
fn test_file_actions_need_controller() {
    let (mut ws, _host) = workspace(0);
    let filter = ws.create_cfg_filter(None);
    assert!(!ws.perform(&MenuAction::SaveFilter(filter)));
    assert!(!ws.perform(&MenuAction::SaveWorkspace));
}

#[test]
fn test_filter_menu_for_selection() {
    let (mut ws, host) = workspace(0);
    let filter = ws.create_cfg_filter(Some(Filter::with_file_name("/logs/rules.flt")));
    host.selection.set(&[filter]);

    let menu = ws.popup_menu();
    assert!(!menu.is_empty());
    assert!(menu.iter().any(|e| e.action == MenuAction::SaveFilterAs(filter)));
}

#[test]
fn test_bookmarks_stay_sorted_and_unique() {
    let (mut ws, host) = workspace(100);

    for row in [40, 10, 70] {
        ws.add_bookmark("mark", row).unwrap();
    }
    assert!(ws.add_bookmark("again", 10).is_none());
    assert!(ws.add_bookmark("past end", 500).is_none());
    assert_eq!(ws.bookmark_rows(), vec![10, 40, 70]);

    assert_eq!(ws.next_bookmark(70, false), Some(10));
    assert_eq!(ws.next_bookmark(10, true), Some(70));
    assert_eq!(ws.get_closest_bookmark(52), Some(40));

    host.prompt.queue_text(Some("new comment"));
    let id = ws.toggle_bookmark(55).unwrap();
    assert_eq!(ws.node(id).unwrap().text(), "55 - new comment");
    assert_eq!(ws.bookmark_rows(), vec![10, 40, 55, 70]);

    assert!(ws.toggle_bookmark(55).is_none());
    assert_eq!(ws.bookmark_rows(), vec![10, 40, 70]);

    assert!(ws.perform(&MenuAction::GotoBookmark(40)));
    assert_eq!(host.document.with_state(|s| s.goto_rows.clone()), vec![40]);
}

#[test]
fn test_shutdown_releases_everything() {
    let (mut ws, _host) = workspace(10);
    let mut filter = Filter::with_file_name("/logs/a.flt");
    filter.push_item(FilterItem::new("x"));
    ws.create_cfg_filter(Some(filter));
    ws.add_bookmark("b", 3).unwrap();

    ws.begin_shutdown();
    assert_eq!(ws.shutdown(), 0);
}
