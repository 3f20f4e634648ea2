//! Tag based file representation of the tree.
//!
//! Each section writes nothing when its container is empty. Paths are made
//! relative to [`WriteContext::base_dir`] when [`SaveOptions::REL_PATH`] is set.

use super::Workspace;
use crate::models::FilterItem;
use crate::paths::relative_path;
use crate::tree::{CfgNode, NodeId, Payload, SaveOptions};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::{self, Write};

/// Current version of the workspace/filter file format
pub const FILE_FORMAT_VERSION: u32 = 2;

pub const FILE_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n";

pub const PRODUCT_HEADER: &str = "<LogScrutinizer version=\"2\">\n";

pub const FILE_FOOTER: &str = "</LogScrutinizer>\n";

/// Backslash escape every `\` and `"` of an attribute value
pub fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn yes_no(value: bool) -> &'static str {
    if value { "y" } else { "n" }
}

/// How paths and sections are written
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    pub options: SaveOptions,
    /// Directory of the file being written
    pub base_dir: Option<&'a Utf8Path>,
}

impl<'a> WriteContext<'a> {
    pub fn new(options: SaveOptions, base_dir: Option<&'a Utf8Path>) -> Self {
        Self { options, base_dir }
    }

    fn path(&self, path: &Utf8Path) -> Utf8PathBuf {
        match self.base_dir {
            Some(base) if self.options.contains(SaveOptions::REL_PATH) => relative_path(path, base),
            _ => path.to_path_buf(),
        }
    }
}

/// One `<filter .../>` line
pub fn write_filter_item<W: Write + ?Sized>(w: &mut W, item: &FilterItem) -> io::Result<()> {
    writeln!(
        w,
        "    <filter enabled=\"{}\" excluding=\"{}\" color=\"{:04x}\"  bg_color=\"{:04x}\" type=\"matches_text\" case_sensitive=\"{}\" regex=\"{}\" adaptive_clip=\"{}\" text=\"{}\" />",
        yes_no(item.enabled),
        yes_no(item.exclude),
        item.color,
        item.bg_color,
        yes_no(item.case_sensitive),
        yes_no(item.regex),
        yes_no(item.adaptive_clip),
        escape_value(&item.text())
    )
}

impl Workspace {
    /// Write one node with the representation of its kind
    pub fn write_node<W: Write + ?Sized>(&self, id: NodeId, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        let Some(node) = self.tree.get(id) else {
            return Ok(());
        };
        match &node.payload {
            Payload::Filter(_) => self.write_filter(id, w, ctx),
            Payload::FilterItem(item) => write_filter_item(w, item),
            Payload::Log { path } => {
                writeln!(w, "    <log path=\"{}\" />", escape_value(ctx.path(path).as_str()))
            }
            Payload::Bookmark { row, comment } => {
                writeln!(w, "    <bookmark row=\"{}\" text=\"{}\" />", row, escape_value(comment))
            }
            Payload::Plugin(handle) => {
                let path = ctx.path(handle.path());
                writeln!(w, "    <plugin path=\"{}\" />", escape_value(path.as_str()))
            }
            Payload::Comment => {
                writeln!(w, "    <Comment text=\"not implemented\" />")?;
                Err(io::Error::new(io::ErrorKind::Unsupported, "writing comments is not implemented"))
            }
            _ => Ok(()),
        }
    }

    /// `<filters name="...">` with every item of the filter
    pub fn write_filter<W: Write + ?Sized>(&self, id: NodeId, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        let Some(filter) = self.tree.get(id).and_then(CfgNode::filter) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("node {} is not a filter", id),
            ));
        };
        writeln!(w, "  <filters name=\"{}\">", escape_value(ctx.path(filter.file_name()).as_str()))?;
        for child in self.tree.children(id) {
            if let Some(item) = self.tree.get(*child).and_then(CfgNode::filter_item) {
                write_filter_item(w, item)?;
            }
        }
        writeln!(w, "  </filters>")
    }

    /// All filters. Outside the default workspace the filters are marked as
    /// owned by the workspace first.
    pub fn write_filters<W: Write + ?Sized>(&self, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        for id in self.filter_nodes() {
            self.write_filter(id, w, ctx)?;
        }
        Ok(())
    }

    /// Mark every filter as owned by the workspace that was just saved
    pub fn mark_filters_workspace_owned(&mut self) {
        for id in self.filter_nodes() {
            let Some(filter) = self.tree.get_mut(id).and_then(CfgNode::filter_mut) else {
                continue;
            };
            filter.mark_workspace_owned();
            let short_name = filter.short_name().to_string();
            self.set_text(id, short_name);
        }
    }

    fn write_section<W: Write + ?Sized>(
        &self,
        root: NodeId,
        tag: &str,
        w: &mut W,
        ctx: &WriteContext<'_>,
    ) -> io::Result<()> {
        let children = self.tree.children(root);
        if children.is_empty() {
            return Ok(());
        }
        writeln!(w, "  <{}>", tag)?;
        for child in children {
            self.write_node(*child, w, ctx)?;
        }
        writeln!(w, "  </{}>", tag)
    }

    pub fn write_logs<W: Write + ?Sized>(&self, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        self.write_section(self.logs, "logs", w, ctx)
    }

    pub fn write_plugins<W: Write + ?Sized>(&self, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        self.write_section(self.plugins, "plugins", w, ctx)
    }

    pub fn write_bookmarks<W: Write + ?Sized>(&self, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        self.write_section(self.bookmarks, "bookmarks", w, ctx)
    }

    pub fn write_comments<W: Write + ?Sized>(&self, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        self.write_section(self.comments, "Comments", w, ctx)
    }

    /// Write the sections of a workspace file body in file order
    pub fn write_workspace_body<W: Write + ?Sized>(&self, w: &mut W, ctx: &WriteContext<'_>) -> io::Result<()> {
        self.write_logs(w, ctx)?;
        self.write_filters(w, ctx)?;
        self.write_plugins(w, ctx)?;
        if !ctx.options.contains(SaveOptions::TO_DEFAULT_WORKSPACE) {
            self.write_bookmarks(w, ctx)?;
            self.write_comments(w, ctx)?;
        }
        Ok(())
    }
}
