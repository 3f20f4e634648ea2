// Scrutinizer Workspace - configuration tree of a log analysis workspace
//
// Library crate with the tree, the workspace operations, the file formats and
// the transfer codec. The binary crate (main.rs) is a headless loader.

pub mod config;
pub mod headless;
pub mod host;
pub mod logging;
pub mod models;
pub mod paths;
pub mod services;
pub mod tree;
pub mod view;
pub mod workspace;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{AppConfig, Filter, FilterItem, RecentFileKind, RecentFiles, Settings};
pub use services::{ConfigurationController, ConfigurationError};
pub use tree::{CfgNode, ItemKind, NodeId, SaveOptions};
pub use workspace::{MenuAction, Workspace};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
