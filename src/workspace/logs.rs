use super::Workspace;
use crate::tree::{CfgNode, ItemKind, NodeId, Payload};
use camino::Utf8Path;

/// Human readable file size as shown next to the log path
pub fn format_file_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    let bytes = size as f64;
    if size < 1024 {
        format!("Size:{} bytes", size)
    } else if bytes < KB * KB {
        format!("Size:{:.1}kB", bytes / KB)
    } else if bytes < KB * KB * KB {
        format!("Size:{:.1}MB", bytes / (KB * KB))
    } else {
        format!("Size:{:.1}GB", bytes / (KB * KB * KB))
    }
}

impl Workspace {
    /// Show `path` as the log of the workspace, replacing any previous entry.
    ///
    /// The document must already have loaded the file.
    pub fn add_log(&mut self, path: &Utf8Path) -> NodeId {
        let logs = self.logs;
        self.remove_all_children(logs);

        let size = self.host.document.file_size(path);
        let text = format!("{}  {}", path, format_file_size(size));
        self.insert_node(
            CfgNode::new(ItemKind::Log, text, Payload::Log { path: path.to_path_buf() }),
            logs,
            None,
            false,
        )
    }

    /// Remove the log entry; the document drops its rows
    pub fn remove_log(&mut self) {
        let logs = self.logs;
        self.remove_all_children(logs);
    }

    /// Path of the current log, if any
    pub fn log_path(&self) -> Option<&Utf8Path> {
        self.tree.children(self.logs).iter().find_map(|id| match self.tree.get(*id).map(|n| &n.payload) {
            Some(Payload::Log { path }) => Some(path.as_path()),
            _ => None,
        })
    }
}
