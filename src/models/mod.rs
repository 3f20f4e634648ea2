//! Domain payloads referenced by configuration tree nodes.
//!
//! - [`Filter`] / [`FilterItem`]: filter files and their match rules
//! - [`PluginHandle`] / [`PluginInfo`]: a loaded plugin library and what it provides
//! - [`RecentFiles`]: history of recently used files (`.rcnt` database)
//! - [`Settings`]: registered workspace settings written to `<settings>`
//! - [`AppConfig`]: application configuration loaded from `Scrutinizer Config.yaml`

pub mod config;
pub mod filter;
pub mod plugin;
pub mod recent_file;
pub mod settings;

pub use config::AppConfig;
pub use filter::{
    BACKGROUND_COLOR, BLACK, Filter, FilterItem, Rgb, WORKSPACE_MARKER, parse_hex_color, q_rgb,
};
pub use plugin::{PlotDescriptor, PluginHandle, PluginInfo, SubPlotDescriptor, SupportedFeatures};
pub use recent_file::{RecentFile, RecentFileKind, RecentFiles};
pub use settings::Settings;
