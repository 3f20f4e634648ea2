//! Drag/drop and clipboard transfer of tree nodes.
//!
//! The native format is a big-endian tagged stream:
//!
//! ```text
//! STREAM_START
//!   ITEM_START token:u64 kind:i32 [kind:i32 fields...] ITEM_END
//!   ...
//! STREAM_END
//! ```
//!
//! `kind` carries [`KIND_TAG`] in its upper bits. The token identifies the
//! source node within one transfer only. Filter items repeat the kind and
//! append [`FilterItem::pack_fields`]. Plain text drops use a list of
//! length-prefixed UTF-16BE strings.
//!
//! Only filter items can be dropped, and only onto a filter. A drop decodes
//! the whole stream before touching the tree.

use crate::models::FilterItem;
use crate::tree::{CfgNode, ItemKind, NodeId};
use crate::workspace::Workspace;
use crate::workspace::filters::filter_item_node;
use thiserror::Error;

pub const STREAM_START: u32 = 0x1111_1111;
pub const ITEM_START: u32 = 0x2222_2222;
pub const ITEM_END: u32 = 0x3333_3333;
pub const STREAM_END: u32 = 0x4444_4444;

/// Stamp OR'd into every serialized kind
pub const KIND_TAG: i32 = 0x00FE_ED00;
pub const TAG_BITS: i32 = 0x00FF_FF00;
pub const KIND_BITS: i32 = 0xFF;

/// Native tagged stream
pub const MIME_BYTESTREAM: &str = "application/lsz.bytestream";

/// List of plain strings
pub const MIME_TEXT_LIST: &str = "application/vnd.text.list";

const NULL_STRING: u32 = 0xFFFF_FFFF;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Bad stream start tag {0:#010x}")]
    BadStreamStart(u32),

    #[error("Bad item start tag {0:#010x}")]
    BadItemStart(u32),

    #[error("Bad item end tag {0:#010x}")]
    BadItemEnd(u32),

    #[error("Kind stamp mismatch {0:#x}")]
    StampMismatch(i32),

    #[error("Kind {0} can't be dropped")]
    UnsupportedKind(i32),

    #[error("Transfer data truncated")]
    Truncated,

    #[error("Node {0} is not a valid drop target")]
    InvalidDropTarget(NodeId),

    #[error("Unknown transfer format {0}")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropAction {
    Copy,
    Move,
}

/// Formats offered when dragging
pub fn mime_types() -> [&'static str; 2] {
    [MIME_BYTESTREAM, MIME_TEXT_LIST]
}

fn stamped(kind: ItemKind) -> i32 {
    kind.raw() | KIND_TAG
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn bytes(&mut self, count: usize) -> Result<&'a [u8], TransferError> {
        let end = self.pos.checked_add(count).ok_or(TransferError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(TransferError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TransferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, TransferError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, TransferError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, TransferError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn bool(&mut self) -> Result<bool, TransferError> {
        Ok(self.array::<1>()?[0] != 0)
    }
}

/// Serialize nodes in tree order
pub fn encode_selection(workspace: &Workspace, nodes: &[NodeId]) -> Vec<u8> {
    let tree = workspace.tree();
    let mut ordered: Vec<NodeId> = nodes.iter().copied().filter(|id| tree.contains(*id)).collect();
    ordered.sort_by_key(|id| tree.path_key(*id));
    ordered.dedup();

    let mut out = Vec::new();
    out.extend_from_slice(&STREAM_START.to_be_bytes());
    for id in ordered {
        let Some(node) = tree.get(id) else {
            continue;
        };
        out.extend_from_slice(&ITEM_START.to_be_bytes());
        out.extend_from_slice(&u64::from(id.raw()).to_be_bytes());
        out.extend_from_slice(&stamped(node.kind()).to_be_bytes());
        if let Some(item) = node.filter_item() {
            out.extend_from_slice(&stamped(ItemKind::FilterItem).to_be_bytes());
            item.pack_fields(&mut out);
        }
        out.extend_from_slice(&ITEM_END.to_be_bytes());
    }
    out.extend_from_slice(&STREAM_END.to_be_bytes());
    out
}

/// Serialize strings as a plain text list
pub fn encode_text_list(texts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for text in texts {
        let units: Vec<u16> = text.encode_utf16().collect();
        out.extend_from_slice(&((units.len() * 2) as u32).to_be_bytes());
        for unit in units {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }
    out
}

fn decode_filter_item(reader: &mut Reader<'_>) -> Result<FilterItem, TransferError> {
    let kind = reader.i32()?;
    if kind != stamped(ItemKind::FilterItem) {
        return Err(TransferError::StampMismatch(kind));
    }

    let mut item = FilterItem::default();
    item.enabled = reader.bool()?;
    item.exclude = reader.bool()?;
    item.color = reader.u32()?;
    item.bg_color = reader.u32()?;
    item.case_sensitive = reader.bool()?;
    item.regex = reader.bool()?;
    item.adaptive_clip = reader.bool()?;
    item.case_sensitive = reader.bool()?;

    let size = reader.i32()?;
    let size = usize::try_from(size).map_err(|_| TransferError::Truncated)?;
    item.set_text_bytes(reader.bytes(size)?.to_vec());
    Ok(item)
}

/// Decode a native stream into (source token, item) pairs
pub fn decode_stream(data: &[u8]) -> Result<Vec<(u64, FilterItem)>, TransferError> {
    let mut reader = Reader::new(data);
    let start = reader.u32()?;
    if start != STREAM_START {
        return Err(TransferError::BadStreamStart(start));
    }

    let mut items = Vec::new();
    loop {
        match reader.u32()? {
            STREAM_END => break,
            ITEM_START => {}
            other => return Err(TransferError::BadItemStart(other)),
        }

        let token = reader.u64()?;
        let kind = reader.i32()?;
        if kind & TAG_BITS != KIND_TAG {
            return Err(TransferError::StampMismatch(kind));
        }
        if kind & KIND_BITS != ItemKind::FilterItem.raw() {
            return Err(TransferError::UnsupportedKind(kind & KIND_BITS));
        }

        let item = decode_filter_item(&mut reader)?;

        let end = reader.u32()?;
        if end != ITEM_END {
            return Err(TransferError::BadItemEnd(end));
        }
        items.push((token, item));
    }
    Ok(items)
}

/// Decode a plain text list; null and empty strings are skipped
pub fn decode_text_list(data: &[u8]) -> Result<Vec<String>, TransferError> {
    let mut reader = Reader::new(data);
    let mut texts = Vec::new();
    while !reader.at_end() {
        let len = reader.u32()?;
        if len == NULL_STRING {
            continue;
        }
        let bytes = reader.bytes(len as usize)?;
        if bytes.len() % 2 != 0 {
            return Err(TransferError::Truncated);
        }
        let units = bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        let text: String = char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        if !text.is_empty() {
            texts.push(text);
        }
    }
    Ok(texts)
}

/// Filter and row where dropped items land
fn drop_target(workspace: &Workspace, parent: NodeId, row: Option<usize>) -> Result<(NodeId, usize), TransferError> {
    let tree = workspace.tree();
    match (tree.kind(parent), row) {
        (Some(ItemKind::Filter), Some(row)) => Ok((parent, row)),
        (Some(ItemKind::Filter), None) => Ok((parent, 0)),
        (Some(ItemKind::FilterItem), None) => {
            let filter = tree.parent(parent).ok_or(TransferError::InvalidDropTarget(parent))?;
            let index = tree.index_of(parent).ok_or(TransferError::InvalidDropTarget(parent))?;
            Ok((filter, index + 1))
        }
        _ => Err(TransferError::InvalidDropTarget(parent)),
    }
}

/// Drop transfer data onto `parent`.
///
/// With `row` the items are inserted at that row of the filter `parent`;
/// without it, dropping on a filter inserts first and dropping on a filter
/// item inserts after it. On a move the source filter items are deleted once
/// every new node exists. Returns the new nodes, which become the selection.
pub fn drop_data(
    workspace: &mut Workspace,
    format: &str,
    data: &[u8],
    action: DropAction,
    parent: NodeId,
    row: Option<usize>,
) -> Result<Vec<NodeId>, TransferError> {
    let (filter, mut index) = drop_target(workspace, parent, row)?;

    let decoded: Vec<(Option<u64>, FilterItem)> = match format {
        MIME_BYTESTREAM => decode_stream(data)?
            .into_iter()
            .map(|(token, item)| (Some(token), item))
            .collect(),
        MIME_TEXT_LIST => decode_text_list(data)?
            .iter()
            .map(|text| (None, FilterItem::new(text)))
            .collect(),
        other => return Err(TransferError::UnknownFormat(other.to_string())),
    };

    workspace.unselect_all();
    let mut created = Vec::with_capacity(decoded.len());
    let mut sources = Vec::new();
    for (token, item) in decoded {
        let id = workspace.insert_node_at(filter_item_node(item), filter, index, false);
        index += 1;
        created.push(id);
        if let Some(source) = token.and_then(|t| u32::try_from(t).ok()) {
            sources.push(NodeId(source));
        }
    }

    if action == DropAction::Move {
        for source in sources {
            let is_item = workspace
                .tree()
                .get(source)
                .is_some_and(|n: &CfgNode| n.kind() == ItemKind::FilterItem);
            if is_item && !created.contains(&source) {
                workspace.delete_item(source);
            }
        }
    }

    if workspace.selection_enabled() {
        for id in &created {
            workspace.host_mut().selection.select(*id);
        }
    }
    tracing::info!("Dropped {} items onto {}", created.len(), filter);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::host::SelectionSource;
    use crate::models::Filter;
    use crate::view::NullViewSink;

    fn workspace_with(texts: &[&str]) -> (Workspace, HeadlessHost, NodeId) {
        let host = HeadlessHost::new();
        let mut ws = Workspace::new(host.host(), Box::new(NullViewSink));
        let mut filter = Filter::with_file_name("f.flt");
        for text in texts {
            filter.push_item(FilterItem::new(text));
        }
        let id = ws.create_cfg_filter(Some(filter));
        (ws, host, id)
    }

    fn texts(ws: &Workspace, filter: NodeId) -> Vec<String> {
        ws.filter_item_nodes(filter)
            .into_iter()
            .map(|id| ws.node(id).unwrap().text().to_string())
            .collect()
    }

    #[test]
    fn test_stream_layout() {
        let (ws, _host, filter) = workspace_with(&["x"]);
        let item = ws.filter_item_nodes(filter)[0];
        let data = encode_selection(&ws, &[item]);

        assert_eq!(&data[..4], &STREAM_START.to_be_bytes());
        assert_eq!(&data[4..8], &ITEM_START.to_be_bytes());
        assert_eq!(&data[8..16], &u64::from(item.raw()).to_be_bytes());
        assert_eq!(&data[16..20], &0x00FE_ED04i32.to_be_bytes());
        assert_eq!(&data[20..24], &0x00FE_ED04i32.to_be_bytes());
        assert_eq!(&data[data.len() - 4..], &STREAM_END.to_be_bytes());
    }

    #[test]
    fn test_copy_onto_filter_item() {
        let (mut ws, _host, filter) = workspace_with(&["a", "b", "c"]);
        let items = ws.filter_item_nodes(filter);
        let data = encode_selection(&ws, &[items[2], items[0]]);

        let created = drop_data(&mut ws, MIME_BYTESTREAM, &data, DropAction::Copy, items[1], None).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(texts(&ws, filter), vec!["a", "b", "a", "c", "c"]);
    }

    #[test]
    fn test_move_deletes_sources() {
        let (mut ws, host, filter) = workspace_with(&["a", "b", "c"]);
        let items = ws.filter_item_nodes(filter);
        let data = encode_selection(&ws, &[items[0]]);

        let created = drop_data(&mut ws, MIME_BYTESTREAM, &data, DropAction::Move, filter, Some(3)).unwrap();
        assert_eq!(texts(&ws, filter), vec!["b", "c", "a"]);
        assert!(!ws.tree().contains(items[0]));
        assert_eq!(host.selection.selected(), created);
    }

    #[test]
    fn test_bad_stream_changes_nothing() {
        let (mut ws, _host, filter) = workspace_with(&["a", "b"]);
        let items = ws.filter_item_nodes(filter);
        let mut data = encode_selection(&ws, &items);
        let len = data.len();
        data[len - 8..len - 4].copy_from_slice(&0xdead_beefu32.to_be_bytes());

        let result = drop_data(&mut ws, MIME_BYTESTREAM, &data, DropAction::Copy, filter, None);
        assert_eq!(result, Err(TransferError::BadItemEnd(0xdead_beef)));
        assert_eq!(texts(&ws, filter), vec!["a", "b"]);
    }

    #[test]
    fn test_non_filter_item_rejected() {
        let (mut ws, _host, filter) = workspace_with(&[]);
        let data = encode_selection(&ws, &[filter]);
        assert_eq!(
            drop_data(&mut ws, MIME_BYTESTREAM, &data, DropAction::Copy, filter, None),
            Err(TransferError::UnsupportedKind(ItemKind::Filter.raw()))
        );
    }

    #[test]
    fn test_unstamped_kind_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&STREAM_START.to_be_bytes());
        data.extend_from_slice(&ITEM_START.to_be_bytes());
        data.extend_from_slice(&0u64.to_be_bytes());
        data.extend_from_slice(&4i32.to_be_bytes());
        assert_eq!(decode_stream(&data), Err(TransferError::StampMismatch(4)));
        assert_eq!(decode_stream(&data[..6]), Err(TransferError::Truncated));
        assert_eq!(decode_stream(&[0, 0, 0, 0]), Err(TransferError::BadStreamStart(0)));
    }

    #[test]
    fn test_invalid_targets() {
        let (mut ws, _host, filter) = workspace_with(&["a"]);
        let item = ws.filter_item_nodes(filter)[0];
        let data = encode_text_list(&["x"]);
        let root = ws.filters_root();

        assert_eq!(
            drop_data(&mut ws, MIME_TEXT_LIST, &data, DropAction::Copy, root, None),
            Err(TransferError::InvalidDropTarget(root))
        );
        assert_eq!(
            drop_data(&mut ws, MIME_TEXT_LIST, &data, DropAction::Copy, item, Some(0)),
            Err(TransferError::InvalidDropTarget(item))
        );
        assert!(matches!(
            drop_data(&mut ws, "text/html", &data, DropAction::Copy, filter, None),
            Err(TransferError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_text_list_drop() {
        let (mut ws, _host, filter) = workspace_with(&["a"]);
        let data = encode_text_list(&["error", "", "wärning"]);
        let mut with_null = data.clone();
        with_null.extend_from_slice(&NULL_STRING.to_be_bytes());

        drop_data(&mut ws, MIME_TEXT_LIST, &with_null, DropAction::Copy, filter, Some(1)).unwrap();
        assert_eq!(texts(&ws, filter), vec!["a", "error", "wärning"]);
    }

    #[test]
    fn test_copied_items_keep_fields_with_new_identity() {
        let (mut ws, _host, filter) = workspace_with(&["he said \"hi\""]);
        let source = ws.filter_item_nodes(filter)[0];
        ws.set_filter_item_enabled(source, false);
        let data = encode_selection(&ws, &[source]);

        let created = drop_data(&mut ws, MIME_BYTESTREAM, &data, DropAction::Copy, filter, None).unwrap();
        let original = ws.node(source).unwrap().filter_item().unwrap();
        let copy = ws.node(created[0]).unwrap().filter_item().unwrap();
        assert!(copy.same_rule(original));
        assert_ne!(copy.unique_id, original.unique_id);
    }
}
