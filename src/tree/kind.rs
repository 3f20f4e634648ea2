//! Item kinds, status bits and save options of configuration items.
//!
//! The numeric values of [`ItemKind`] are part of the binary transfer format
//! (they are OR'd with a stamp), so they must never be renumbered.

use std::fmt;
use std::ops::BitOr;

/// Closed set of configuration item kinds
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    None = 0,
    Root = 1,
    FilterRoot = 2,
    Filter = 3,
    FilterItem = 4,
    CommentRoot = 5,
    Comment = 6,
    BookmarkRoot = 7,
    Bookmark = 8,
    PlugInRoot = 9,
    PlugIn = 10,
    DecoderRoot = 11,
    Decoder = 12,
    PlotRoot = 13,
    Plot = 14,
    SubPlot = 15,
    Graph = 16,
    SequenceDiagram = 17,
    LogRoot = 18,
    Log = 19,
}

impl ItemKind {
    const ALL: [ItemKind; 20] = [
        ItemKind::None,
        ItemKind::Root,
        ItemKind::FilterRoot,
        ItemKind::Filter,
        ItemKind::FilterItem,
        ItemKind::CommentRoot,
        ItemKind::Comment,
        ItemKind::BookmarkRoot,
        ItemKind::Bookmark,
        ItemKind::PlugInRoot,
        ItemKind::PlugIn,
        ItemKind::DecoderRoot,
        ItemKind::Decoder,
        ItemKind::PlotRoot,
        ItemKind::Plot,
        ItemKind::SubPlot,
        ItemKind::Graph,
        ItemKind::SequenceDiagram,
        ItemKind::LogRoot,
        ItemKind::Log,
    ];

    /// Numeric value as used on the wire
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Convert a wire value back into a kind
    pub fn from_raw(value: i32) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// True for the fixed container kinds that group other items
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ItemKind::Root
                | ItemKind::FilterRoot
                | ItemKind::CommentRoot
                | ItemKind::BookmarkRoot
                | ItemKind::PlugInRoot
                | ItemKind::DecoderRoot
                | ItemKind::PlotRoot
                | ItemKind::LogRoot
        )
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Presentation status bits of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ItemStatus(u32);

impl ItemStatus {
    pub const NONE: ItemStatus = ItemStatus(0);
    pub const MODIFIED: ItemStatus = ItemStatus(1);
    pub const ERROR: ItemStatus = ItemStatus(2);
    pub const WARNING: ItemStatus = ItemStatus(4);
    pub const DISABLED: ItemStatus = ItemStatus(8);
    pub const GRAYED: ItemStatus = ItemStatus(16);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: ItemStatus) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ItemStatus) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ItemStatus) {
        self.0 &= !other.0;
    }
}

impl BitOr for ItemStatus {
    type Output = ItemStatus;

    fn bitor(self, rhs: ItemStatus) -> ItemStatus {
        ItemStatus(self.0 | rhs.0)
    }
}

/// Options controlling how the tree is written to a workspace/filter file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions(u32);

impl SaveOptions {
    pub const NONE: SaveOptions = SaveOptions(0);
    /// Saving the default workspace; bookmarks and comments are left out
    pub const TO_DEFAULT_WORKSPACE: SaveOptions = SaveOptions(1);
    /// Write paths relative to the workspace directory
    pub const REL_PATH: SaveOptions = SaveOptions(2);

    pub fn contains(self, other: SaveOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SaveOptions {
    type Output = SaveOptions;

    fn bitor(self, rhs: SaveOptions) -> SaveOptions {
        SaveOptions(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_raw_values_are_stable() {
        assert_eq!(ItemKind::FilterItem.raw(), 4);
        assert_eq!(ItemKind::Log.raw(), 19);
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_raw(kind.raw()), Some(kind));
        }
        assert_eq!(ItemKind::from_raw(20), None);
        assert_eq!(ItemKind::from_raw(-1), None);
    }

    #[test]
    fn test_status_bits() {
        let mut status = ItemStatus::DISABLED | ItemStatus::GRAYED;
        assert!(status.contains(ItemStatus::DISABLED));
        status.remove(ItemStatus::DISABLED);
        assert!(!status.contains(ItemStatus::DISABLED));
        assert_eq!(status.bits(), 16);
    }

    #[test]
    fn test_save_options() {
        let options = SaveOptions::REL_PATH | SaveOptions::TO_DEFAULT_WORKSPACE;
        assert!(options.contains(SaveOptions::REL_PATH));
        assert!(!SaveOptions::REL_PATH.contains(SaveOptions::TO_DEFAULT_WORKSPACE));
    }
}
