//! Collaborators consumed by the workspace.
//!
//! The log engine, the plugin loader, interactive prompts and the tree view
//! selection are outside this crate. They are reached through the traits
//! below, bundled into a [`Host`]. The [`headless`](crate::headless) module
//! provides file system backed implementations.

use crate::models::{FilterItem, PluginHandle, Rgb};
use crate::tree::NodeId;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors reported by a [`PluginHost`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginLoadError {
    #[error("Plugin file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Not a plugin library: {0}")]
    NotALibrary(Utf8PathBuf),

    #[error("Failed to load plugin {path}: {reason}")]
    LoadFailed { path: Utf8PathBuf, reason: String },

    #[error("Plugin {path} has API version {found}, expected {expected}")]
    ApiVersionMismatch {
        path: Utf8PathBuf,
        found: u32,
        expected: u32,
    },
}

/// The log document and its row/filter engine
#[cfg_attr(test, mockall::automock)]
pub trait Document {
    /// Load a log file, replacing the current one
    fn load_log(&mut self, path: &Utf8Path) -> bool;

    /// Drop the row database of the current log
    fn clean_db(&mut self, keep_filters: bool);

    /// Number of rows of the current log
    fn row_count(&self) -> usize;

    fn file_size(&self, path: &Utf8Path) -> u64;

    /// Re-filter a single row after a bookmark was added or removed
    fn start_one_line_filtering(&mut self, row: usize, is_removal: bool);

    /// Refresh the color lookup of a filter item
    fn update_filter_item(&mut self, unique_id: u32, color: Rgb, bg_color: Rgb);

    fn add_decoders(&mut self, decoders: &[String]);

    fn remove_decoder(&mut self, name: &str);

    fn clean_row_cache(&mut self);

    /// Plugin provided decoders are gone; dependent caches must be rebuilt
    fn plugin_unloaded(&mut self);

    fn quick_search(&mut self, text: &str, forward: bool, case_sensitive: bool, regex: bool);

    fn goto_row(&mut self, row: usize);
}

/// Loader of plugin libraries
#[cfg_attr(test, mockall::automock)]
pub trait PluginHost {
    fn load_library(&mut self, path: &Utf8Path) -> Result<PluginHandle, PluginLoadError>;

    fn unload(&mut self, handle: &PluginHandle);

    /// Detach a plot from the plot pane
    fn detach_plot(&mut self, plot: &str);

    /// Run a plot; returns the graph names produced for each sub-plot, in sub-plot order
    fn run_plot(&mut self, plugin: &PluginHandle, plot: &str) -> Vec<Vec<String>>;
}

/// Interactive dialogs
#[cfg_attr(test, mockall::automock)]
pub trait Prompt {
    /// Single line text input; `None` when cancelled
    fn text_input(&mut self, title: &str, label: &str, initial: &str) -> Option<String>;

    /// Filter item properties dialog; returns the edited item when accepted
    fn edit_filter_item(&mut self, item: &FilterItem) -> Option<FilterItem>;

    fn confirm(&mut self, title: &str, message: &str) -> bool;

    fn pick_open_path(&mut self, title: &str, extensions: &[String]) -> Option<Utf8PathBuf>;

    fn pick_save_path(&mut self, title: &str, proposed: &Utf8Path) -> Option<Utf8PathBuf>;

    fn warn(&mut self, title: &str, message: &str);

    fn show_info(&mut self, title: &str, message: &str);

    /// Open a folder or web page with the desktop
    fn open_url(&mut self, url: &str);
}

/// Selection state of the tree view
#[cfg_attr(test, mockall::automock)]
pub trait SelectionSource {
    /// Selected nodes in selection order
    fn selected(&self) -> Vec<NodeId>;

    fn select(&mut self, node: NodeId);

    fn unselect_all(&mut self);
}

/// All collaborators of a workspace
pub struct Host {
    pub document: Box<dyn Document>,
    pub plugins: Box<dyn PluginHost>,
    pub prompt: Box<dyn Prompt>,
    pub selection: Box<dyn SelectionSource>,
}
