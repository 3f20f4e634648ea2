use serde::{Deserialize, Serialize};

/// Application configuration from `Scrutinizer Config.yaml`.
///
/// Every field has a default so a partial (or missing) file is valid.
/// Fields can be overridden with `SCRUTINIZER_<FIELD>` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// File name of the default workspace, relative to the config directory
    pub default_workspace: String,

    /// File name of the recent file database, stored next to the default workspace
    pub recent_file_db: String,

    /// Maximum number of entries kept in the recent file history
    pub recent_file_max: usize,

    /// Extension of plugin libraries on this platform
    pub plugin_extension: String,

    pub debug_mode: bool,

    /// Directory for rotating log files
    pub log_dir: String,

    /// Also log to the console
    pub log_console: bool,
}

fn default_plugin_extension() -> String {
    if cfg!(windows) {
        "dll".to_string()
    } else if cfg!(target_os = "macos") {
        "dylib".to_string()
    } else {
        "so".to_string()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_workspace: "default_workspace.lsz".to_string(),
            recent_file_db: "recent_files.rcnt".to_string(),
            recent_file_max: 20,
            plugin_extension: default_plugin_extension(),
            debug_mode: false,
            log_dir: "logs".to_string(),
            log_console: false,
        }
    }
}
