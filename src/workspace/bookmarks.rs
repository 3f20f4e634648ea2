//! Bookmarks, kept in ascending row order with at most one per row.

use super::Workspace;
use crate::tree::{CfgNode, ItemKind, NodeId, Payload};

/// Display text of a bookmark node
pub fn bookmark_text(row: usize, comment: &str) -> String {
    format!("{} - {}", row, comment)
}

impl Workspace {
    pub fn bookmark_nodes(&self) -> Vec<NodeId> {
        self.tree.children(self.bookmarks).to_vec()
    }

    /// Bookmarked rows in list order
    pub fn bookmark_rows(&self) -> Vec<usize> {
        self.tree
            .children(self.bookmarks)
            .iter()
            .filter_map(|id| self.tree.get(*id).and_then(CfgNode::bookmark_row))
            .collect()
    }

    fn find_bookmark(&self, row: usize) -> Option<NodeId> {
        self.tree
            .find_child(self.bookmarks, |node| node.bookmark_row() == Some(row))
    }

    pub fn is_bookmarked(&self, row: usize) -> bool {
        self.find_bookmark(row).is_some()
    }

    fn row_in_range(&self, row: usize) -> bool {
        let rows = self.host.document.row_count();
        if row > rows {
            tracing::warn!("Bookmark row {} is beyond the log ({} rows)", row, rows);
            return false;
        }
        true
    }

    fn insert_bookmark(&mut self, comment: &str, row: usize) -> NodeId {
        let bookmarks = self.bookmarks;
        let mut before = bookmarks;
        for id in self.tree.children(bookmarks) {
            match self.tree.get(*id).and_then(CfgNode::bookmark_row) {
                Some(existing) if existing < row => before = *id,
                _ => break,
            }
        }

        let node = CfgNode::new(
            ItemKind::Bookmark,
            bookmark_text(row, comment),
            Payload::Bookmark {
                row,
                comment: comment.to_string(),
            },
        );
        let id = self.insert_node(node, bookmarks, Some(before), false);
        self.host.document.start_one_line_filtering(row, false);
        id
    }

    /// Add a bookmark unless `row` already has one
    pub fn add_bookmark(&mut self, comment: &str, row: usize) -> Option<NodeId> {
        if !self.row_in_range(row) {
            return None;
        }
        if self.is_bookmarked(row) {
            tracing::debug!("Row {} is already bookmarked", row);
            return None;
        }
        Some(self.insert_bookmark(comment, row))
    }

    /// Remove the bookmark at `row`, or ask for a comment and add one
    pub fn toggle_bookmark(&mut self, row: usize) -> Option<NodeId> {
        if !self.row_in_range(row) {
            return None;
        }

        if let Some(existing) = self.find_bookmark(row) {
            self.delete_item(existing);
            return None;
        }

        let comment = self.host.prompt.text_input(
            "Create bookmark",
            "Enter description:",
            "Enter your bookmark comment here",
        )?;
        Some(self.insert_bookmark(&comment, row))
    }

    /// Change the comment of a bookmark through a text prompt
    pub fn edit_bookmark(&mut self, id: NodeId) -> bool {
        let Some(Payload::Bookmark { comment, .. }) = self.tree.get(id).map(|n| &n.payload) else {
            tracing::warn!("Edit bookmark: {} is not a bookmark", id);
            return false;
        };
        let current = comment.clone();

        let Some(comment) = self
            .host
            .prompt
            .text_input("Edit bookmark", "Enter your description", &current)
        else {
            return false;
        };

        let Some(node) = self.tree.get_mut(id) else {
            return false;
        };
        let Payload::Bookmark { row, comment: stored } = &mut node.payload else {
            return false;
        };
        *stored = comment;
        let text = bookmark_text(*row, stored);
        self.set_text(id, text);
        true
    }

    /// Row of the bookmark nearest to `row`; the first one wins a tie
    pub fn get_closest_bookmark(&self, row: usize) -> Option<usize> {
        self.bookmark_rows()
            .into_iter()
            .min_by_key(|bookmark| bookmark.abs_diff(row))
    }

    /// Next bookmark after `row` (or before it when `backward`), wrapping around
    pub fn next_bookmark(&self, row: usize, backward: bool) -> Option<usize> {
        let rows = self.bookmark_rows();
        if backward {
            rows.iter()
                .rev()
                .find(|bookmark| **bookmark < row)
                .or_else(|| rows.last())
                .copied()
        } else {
            rows.iter()
                .find(|bookmark| **bookmark > row)
                .or_else(|| rows.first())
                .copied()
        }
    }

    pub fn remove_all_bookmarks(&mut self) {
        let bookmarks = self.bookmarks;
        self.remove_all_children(bookmarks);
    }
}
