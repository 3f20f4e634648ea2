//! Loading and saving of workspace, filter and recent file documents.
//!
//! [`ConfigurationController`] reads a file into a pooled buffer, feeds it to
//! the tag tokenizer and turns the callbacks into tree operations on a
//! [`Workspace`]. Saving goes the other way through the workspace writer.
//!
//! Load state is tracked on two levels: the section (`<filters>`, `<logs>`,
//! ...) and the single item tag inside it (`<filter>`, `<log>`, ...).

use crate::config::ConfigManager;
use crate::models::{AppConfig, Filter, FilterItem, RecentFileKind, RecentFiles, Settings, parse_hex_color};
use crate::paths::{parent_dir, resolve};
use crate::services::mem_pool::{MemPool, PooledBuffer};
use crate::services::tag_parser::{ParseError, TagHandler, parse_document, search_element_attribute};
use crate::tree::{CfgNode, NodeId, SaveOptions};
use crate::workspace::menu::DEFAULT_FILTER_MARKER;
use crate::workspace::writer::{FILE_FOOTER, FILE_FORMAT_VERSION, FILE_HEADER, PRODUCT_HEADER, WriteContext};
use crate::workspace::{MenuAction, Workspace};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use thiserror::Error;

/// Root element of every document
pub const ROOT_TAG: &str = "LogScrutinizer";

/// Root element written by the predecessor tool
pub const LEGACY_ROOT_TAG: &str = "TextAnalysisTool.NET";

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Couldn't open file: {0}")]
    CannotOpen(Utf8PathBuf),

    #[error("File is empty: {0}")]
    EmptyFile(Utf8PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Save cancelled, no file name chosen")]
    SaveCancelled,

    #[error("Node {0} is not a filter")]
    NotAFilter(NodeId),
}

/// Section level of the parse state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Document,
    Filters,
    Logs,
    Bookmarks,
    Comments,
    Plugins,
    Searches,
    Settings,
    RecentFiles,
}

impl Section {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "filters" => Self::Filters,
            "logs" => Self::Logs,
            "bookmarks" => Self::Bookmarks,
            "comments" | "Comments" => Self::Comments,
            "plugins" => Self::Plugins,
            "searches" => Self::Searches,
            "settings" => Self::Settings,
            "recentfiles" => Self::RecentFiles,
            _ => return None,
        })
    }

    /// The item tag allowed inside this section
    fn entry(self) -> Option<(&'static str, Entry)> {
        Some(match self {
            Self::Filters => ("filter", Entry::Filter),
            Self::Logs => ("log", Entry::Log),
            Self::Bookmarks => ("bookmark", Entry::Bookmark),
            Self::Comments => ("comment", Entry::Comment),
            Self::Plugins => ("plugin", Entry::Plugin),
            Self::Searches => ("search", Entry::Search),
            Self::Settings => ("setting", Entry::Setting),
            Self::RecentFiles => ("recentfile", Entry::RecentFile),
            Self::None | Self::Document => return None,
        })
    }
}

/// Item level of the parse state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    None,
    Filter,
    Log,
    Bookmark,
    Comment,
    Plugin,
    Search,
    Setting,
    RecentFile,
}

/// What kind of load a parse is part of
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseMode {
    Plain,
    Workspace,
    /// A standalone filter file; its own path wins over the `name` attribute
    FilterFile(Utf8PathBuf),
    /// Re-read a filter file into an existing filter node
    Reload { target: NodeId, file: Utf8PathBuf },
}

/// [`TagHandler`] building the tree from a document
struct FileParser<'a> {
    ws: &'a mut Workspace,
    settings: &'a mut Settings,
    recent: &'a mut RecentFiles,
    base_dir: Option<Utf8PathBuf>,
    mode: ParseMode,
    section: Section,
    entry: Entry,
    version: Option<u32>,
    filter_name: Option<Utf8PathBuf>,
    new_filter: Option<Filter>,
    new_item: Option<FilterItem>,
    temp_path: String,
    temp_text: String,
    temp_row: Option<usize>,
    recent_kind: Option<RecentFileKind>,
    recent_timestamp: Option<i64>,
}

fn unknown_tag(tag: &str, context: &str) -> ParseError {
    ParseError::UnknownTag {
        tag: tag.to_string(),
        context: context.to_string(),
    }
}

fn first_char(value: &str) -> Option<char> {
    value.chars().next()
}

impl<'a> FileParser<'a> {
    fn new(
        ws: &'a mut Workspace,
        settings: &'a mut Settings,
        recent: &'a mut RecentFiles,
        base_dir: Option<Utf8PathBuf>,
        mode: ParseMode,
    ) -> Self {
        Self {
            ws,
            settings,
            recent,
            base_dir,
            mode,
            section: Section::None,
            entry: Entry::None,
            version: None,
            filter_name: None,
            new_filter: None,
            new_item: None,
            temp_path: String::new(),
            temp_text: String::new(),
            temp_row: None,
            recent_kind: None,
            recent_timestamp: None,
        }
    }

    fn reset_temp(&mut self) {
        self.temp_path.clear();
        self.temp_text.clear();
        self.temp_row = None;
        self.recent_kind = None;
        self.recent_timestamp = None;
    }

    fn loaded_filter_file(&self) -> Option<&Utf8Path> {
        match &self.mode {
            ParseMode::FilterFile(file) | ParseMode::Reload { file, .. } => Some(file),
            _ => None,
        }
    }

    fn resolve(&self, path: &str) -> Utf8PathBuf {
        resolve(Utf8Path::new(path), self.base_dir.as_deref())
    }

    fn filter_item_attribute(&mut self, name: &str, value: &str) {
        let Some(item) = self.new_item.as_mut() else {
            return;
        };
        match name {
            "enabled" => item.enabled = first_char(value) != Some('n'),
            "excluding" => item.exclude = first_char(value) == Some('y'),
            "case_sensitive" => item.case_sensitive = first_char(value) == Some('y'),
            "regex" => item.regex = first_char(value) == Some('y'),
            "adaptive_clip" => item.adaptive_clip = first_char(value) == Some('y'),
            "color" => match parse_hex_color(value) {
                Some(color) => item.color = color,
                None => tracing::warn!("Bad filter color {:?}", value),
            },
            "bg_color" => match parse_hex_color(value) {
                Some(color) => item.bg_color = color,
                None => tracing::warn!("Bad filter background color {:?}", value),
            },
            "text" => item.set_text(value),
            _ => {}
        }
    }

    fn recent_file_attribute(&mut self, name: &str, value: &str) {
        match name {
            "kind" => self.recent_kind = value.trim().parse().ok().and_then(RecentFileKind::from_raw),
            "path" => self.temp_path = value.to_string(),
            "timestamp" => self.recent_timestamp = value.trim().parse().ok(),
            _ => {}
        }
    }

    /// `name` attribute of `<filters>`
    fn filter_name_attribute(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        let named = self.resolve(value);
        let loaded = self.loaded_filter_file().map(Utf8Path::to_path_buf);
        self.filter_name = match loaded {
            Some(loaded) if loaded != named => Some(loaded),
            _ => Some(named),
        };
    }

    fn finish_filter(&mut self) {
        let Some(mut parsed) = self.new_filter.take() else {
            return;
        };
        let file_name = self
            .filter_name
            .take()
            .or_else(|| self.loaded_filter_file().map(Utf8Path::to_path_buf));

        if let ParseMode::Reload { target, file } = &self.mode {
            let target = *target;
            let file = file_name.unwrap_or_else(|| file.clone());
            self.ws.remove_all_children(target);
            if let Some(filter) = self.ws.node_mut(target).and_then(CfgNode::filter_mut) {
                for item in parsed.take_items() {
                    filter.push_item(item);
                }
            }
            self.ws.set_filter_file_name(target, &file);
            self.ws.insert_filter(target, true);
            tracing::info!("Reloaded filter {} from {}", target, file);
            return;
        }

        let mut filter = match &file_name {
            Some(name) => Filter::with_file_name(name),
            None => Filter::placeholder(),
        };
        if self.mode == ParseMode::Workspace {
            filter.mark_workspace_owned();
        }
        for item in parsed.take_items() {
            filter.push_item(item);
        }
        if let Some(name) = &file_name {
            self.recent.add(RecentFileKind::FilterFile, name, None);
        }
        let id = self.ws.create_cfg_filter(Some(filter));
        tracing::debug!("Created filter {} from {:?}", id, file_name);
    }

    fn finish_log(&mut self) {
        let path = self.resolve(&self.temp_path);
        if !path.is_file() {
            tracing::warn!("Log file of workspace not found: {}", path);
            return;
        }
        self.ws.remove_log();
        if self.ws.host_mut().document.load_log(&path) {
            self.ws.add_log(&path);
        } else {
            tracing::warn!("Failed to load log {}", path);
        }
    }

    fn finish_plugin(&mut self) {
        let path = self.resolve(&self.temp_path);
        if !path.is_file() {
            tracing::warn!("Plugin file not found: {}", path);
            return;
        }
        if self.ws.find_plugin(&path).is_some() || self.ws.get_cfg_item(&path).is_some() {
            tracing::info!("Plugin already loaded: {}", path);
            return;
        }
        if let Err(err) = self.ws.load_plugin(&path) {
            tracing::warn!("{}", err);
            self.ws.host_mut().prompt.warn("Plugin load failed", &err.to_string());
        }
    }

    fn finish_entry(&mut self) {
        match self.entry {
            Entry::Filter => {
                if let (Some(filter), Some(item)) = (self.new_filter.as_mut(), self.new_item.take()) {
                    filter.push_item(item);
                }
            }
            Entry::Log => self.finish_log(),
            Entry::Bookmark => match self.temp_row {
                Some(row) if !self.ws.is_bookmarked(row) => {
                    let comment = std::mem::take(&mut self.temp_text);
                    self.ws.add_bookmark(&comment, row);
                }
                Some(_) => {}
                None => tracing::warn!("Bookmark without row"),
            },
            Entry::Plugin => self.finish_plugin(),
            Entry::RecentFile => match self.recent_kind {
                Some(kind) if !self.temp_path.is_empty() => {
                    self.recent
                        .add(kind, Utf8Path::new(&self.temp_path), self.recent_timestamp);
                }
                _ => tracing::warn!("Incomplete recent file entry {:?}", self.temp_path),
            },
            Entry::Comment | Entry::Search | Entry::Setting | Entry::None => {}
        }
    }
}

impl TagHandler for FileParser<'_> {
    fn element_start(&mut self, name: &str) -> Result<(), ParseError> {
        let before = (self.section, self.entry);
        self.reset_temp();

        match self.section {
            Section::None => {
                if name != ROOT_TAG && name != LEGACY_ROOT_TAG {
                    tracing::error!("Unknown root tag {}", name);
                    return Err(unknown_tag(name, "document root"));
                }
                self.section = Section::Document;
            }
            Section::Document => {
                let Some(section) = Section::from_tag(name) else {
                    tracing::error!("Unknown section tag {}", name);
                    return Err(unknown_tag(name, ROOT_TAG));
                };
                if section == Section::Filters {
                    self.new_filter = Some(Filter::default());
                }
                self.section = section;
            }
            section => {
                match section.entry() {
                    Some((tag, entry)) if tag == name && self.entry == Entry::None => {
                        self.entry = entry;
                        if entry == Entry::Filter {
                            self.new_item = Some(FilterItem::default());
                        }
                    }
                    _ => {
                        tracing::error!("Unknown item tag {} in {:?}", name, section);
                        return Err(unknown_tag(name, &format!("{:?}", section)));
                    }
                }
            }
        }

        tracing::debug!("Element start {}: {:?} -> {:?}", name, before, (self.section, self.entry));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        match (self.section, self.entry) {
            (Section::None, _) => {
                tracing::error!("Attribute {} outside of any element", name);
                Err(ParseError::Aborted(format!("attribute {} outside of any element", name)))
            }
            (Section::Document, _) => {
                if name == "version" {
                    let version = value.trim().parse().ok();
                    if version != Some(FILE_FORMAT_VERSION) {
                        tracing::warn!(
                            "File format version {} differs from {}",
                            value,
                            FILE_FORMAT_VERSION
                        );
                    }
                    self.version = version;
                }
                Ok(())
            }
            (Section::Filters, Entry::None) => {
                if name == "name" {
                    self.filter_name_attribute(value);
                }
                Ok(())
            }
            (_, Entry::Filter) => {
                self.filter_item_attribute(name, value);
                Ok(())
            }
            (_, Entry::Log) | (_, Entry::Plugin) => {
                if name == "path" {
                    self.temp_path = value.to_string();
                }
                Ok(())
            }
            (_, Entry::Bookmark) => {
                match name {
                    "row" => self.temp_row = value.trim().parse().ok(),
                    "text" => self.temp_text = value.to_string(),
                    _ => {}
                }
                Ok(())
            }
            (_, Entry::Setting) => {
                self.settings.set(name, value);
                Ok(())
            }
            (_, Entry::RecentFile) => {
                self.recent_file_attribute(name, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn element_end(&mut self) -> Result<(), ParseError> {
        let before = (self.section, self.entry);

        match (self.section, self.entry) {
            (Section::None, _) => {
                tracing::error!("Element end outside of the document");
                return Err(ParseError::Aborted("unbalanced element end".to_string()));
            }
            (Section::Document, _) => {
                self.section = Section::None;
                self.entry = Entry::None;
            }
            (section, Entry::None) => {
                if section == Section::Filters {
                    self.finish_filter();
                }
                self.section = Section::Document;
            }
            _ => {
                self.finish_entry();
                self.entry = Entry::None;
            }
        }

        tracing::debug!("Element end: {:?} -> {:?}", before, (self.section, self.entry));
        Ok(())
    }
}

/// File kinds dispatched by [`ConfigurationController::load_file_list`]
fn extension_of(path: &Utf8Path) -> String {
    path.extension().unwrap_or("").to_ascii_lowercase()
}

/// Loads and saves workspace, filter, plugin and recent file documents
pub struct ConfigurationController {
    config: AppConfig,
    default_workspace: Utf8PathBuf,
    recent_file_db: Utf8PathBuf,
    settings: Settings,
    recent: RecentFiles,
    pool: MemPool,
}

impl ConfigurationController {
    /// Create a controller storing the default workspace and the recent file
    /// database at the given paths
    pub fn new(config: AppConfig, default_workspace: Utf8PathBuf, recent_file_db: Utf8PathBuf) -> Self {
        let recent = RecentFiles::new(config.recent_file_max);
        Self {
            config,
            default_workspace,
            recent_file_db,
            settings: Settings::default(),
            recent,
            pool: MemPool::new(),
        }
    }

    /// Controller using the locations managed by `manager`
    pub fn from_config_manager(manager: &ConfigManager, config: AppConfig) -> Self {
        let default_workspace = manager.default_workspace_path(&config);
        let recent_file_db = manager.recent_file_db_path(&config);
        Self::new(config, default_workspace, recent_file_db)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn recent_files(&self) -> &RecentFiles {
        &self.recent
    }

    pub fn recent_files_mut(&mut self) -> &mut RecentFiles {
        &mut self.recent
    }

    pub fn pool(&self) -> &MemPool {
        &self.pool
    }

    pub fn default_workspace_path(&self) -> &Utf8Path {
        &self.default_workspace
    }

    pub fn recent_file_db_path(&self) -> &Utf8Path {
        &self.recent_file_db
    }

    /// Whether `path` exists and can be read; optionally tells the user when not
    pub fn can_open(&self, ws: &mut Workspace, path: &Utf8Path, warn: bool) -> bool {
        let readable = path.is_file() && File::open(path).is_ok();
        if !readable && warn {
            let cwd = std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            tracing::info!("Not possible to open file: {}, starting from path: {}", path, cwd);
            ws.host_mut().prompt.warn(
                "File load failed",
                &format!("Couldn't open file: {}, starting from path {}", path, cwd),
            );
        }
        readable
    }

    /// Read a whole file into a pooled buffer
    fn read_file(&self, path: &Utf8Path) -> Result<PooledBuffer, ConfigurationError> {
        let read_error = |source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(read_error)?;
        let size = file.metadata().map_err(read_error)?.len() as usize;
        if size == 0 {
            return Err(ConfigurationError::EmptyFile(path.to_path_buf()));
        }

        let mut buffer = self.pool.checkout(size);
        file.read_exact(&mut buffer).map_err(read_error)?;
        Ok(buffer)
    }

    fn parse_file(&mut self, ws: &mut Workspace, path: &Utf8Path, mode: ParseMode) -> Result<(), ConfigurationError> {
        let buffer = self.read_file(path)?;
        let base_dir = parent_dir(path).map(Utf8Path::to_path_buf);

        let mut parser = FileParser::new(ws, &mut self.settings, &mut self.recent, base_dir, mode);
        let result = parse_document(&buffer, &mut parser);
        let version = parser.version;
        drop(parser);

        result.map_err(|source| {
            tracing::error!("Failed to parse {}: {}", path, source);
            ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::info!("Parsed {} (format version {:?})", path, version);
        self.after_load(ws, path);
        Ok(())
    }

    /// Bookkeeping after a document was parsed
    fn after_load(&mut self, ws: &mut Workspace, path: &Utf8Path) {
        self.recent.add_path(path, &self.config.plugin_extension);

        let extension = extension_of(path);
        if extension == "lsz" {
            ws.set_workspace_file(Some(path.to_path_buf()));
            ws.update_root_name();
        }
        if extension != "rcnt" {
            let db = self.recent_file_db.clone();
            if let Err(err) = self.save_recent_files(&db) {
                tracing::warn!("{}", err);
            }
        }
    }

    /// Parse a single document of any kind into the workspace
    pub fn load_file(&mut self, ws: &mut Workspace, path: &Utf8Path) -> Result<(), ConfigurationError> {
        let path = resolve(path, None);
        if !self.can_open(ws, &path, true) {
            return Err(ConfigurationError::CannotOpen(path));
        }
        let mode = match extension_of(&path).as_str() {
            "lsz" => ParseMode::Workspace,
            "flt" | "tat" => ParseMode::FilterFile(path.clone()),
            _ => ParseMode::Plain,
        };
        self.parse_file(ws, &path, mode)
    }

    /// Open several files at once.
    ///
    /// Workspaces are loaded first; a workspace that refers to an existing log
    /// replaces everything currently loaded. Then the remaining files are
    /// dispatched by extension. Every file is tried; the first error is returned.
    pub fn load_file_list(&mut self, ws: &mut Workspace, files: &[Utf8PathBuf]) -> Result<(), ConfigurationError> {
        if files.is_empty() {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(files.len());
        for file in files {
            let path = resolve(file, None);
            if !path.is_file() {
                tracing::warn!("Failed to open file: {}", path);
                ws.host_mut()
                    .prompt
                    .warn("File load failed", &format!("Couldn't open file: {}", path));
                return Err(ConfigurationError::CannotOpen(path));
            }
            resolved.push(path);
        }

        let selection = ws.set_selection_enabled(false);
        let mut first_error = None;
        let mut record = |result: Result<(), ConfigurationError>| {
            if let Err(err) = result {
                tracing::warn!("{}", err);
                first_error.get_or_insert(err);
            }
        };

        for path in resolved.iter().filter(|p| extension_of(p) == "lsz") {
            record(self.load_workspace_file(ws, path));
        }

        for path in &resolved {
            let extension = extension_of(path);
            match extension.as_str() {
                "lsz" => {}
                "txt" | "log" => {
                    ws.remove_log();
                    if ws.host_mut().document.load_log(path) {
                        ws.add_log(path);
                        self.recent.add(RecentFileKind::LogFile, path, None);
                    } else {
                        record(Err(ConfigurationError::CannotOpen(path.clone())));
                    }
                }
                "tat" | "flt" => record(self.parse_file(ws, path, ParseMode::FilterFile(path.clone()))),
                "rcnt" => record(self.parse_file(ws, path, ParseMode::Plain)),
                ext if ext == self.config.plugin_extension => {
                    if ws.find_plugin(path).is_some() {
                        tracing::info!("Plugin already loaded: {}", path);
                        continue;
                    }
                    match ws.load_plugin(path) {
                        Ok(_) => self.recent.add(RecentFileKind::PluginFile, path, None),
                        Err(err) => {
                            ws.host_mut().prompt.warn("Plugin load failed", &err.to_string());
                            tracing::warn!("{}", err);
                        }
                    }
                }
                _ => {
                    tracing::warn!("Not supported file extension: {}", path);
                    ws.host_mut().prompt.warn(
                        "Warning, not supported file extension",
                        &format!("The file {} has an extension that can't be opened", path),
                    );
                }
            }
        }

        ws.set_selection_enabled(selection);
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn load_workspace_file(&mut self, ws: &mut Workspace, path: &Utf8Path) -> Result<(), ConfigurationError> {
        ws.set_workspace_file(Some(path.to_path_buf()));

        let has_log = {
            let buffer = self.read_file(path)?;
            search_element_attribute(&buffer, "log", "path")
                .map(|log| resolve(Utf8Path::new(&log), parent_dir(path)))
                .is_some_and(|log| log.is_file())
        };
        if has_log {
            self.clean_all(ws);
            ws.set_workspace_file(Some(path.to_path_buf()));
        }

        self.parse_file(ws, path, ParseMode::Workspace)
    }

    /// Remove everything from the workspace
    pub fn clean_all(&mut self, ws: &mut Workspace) {
        tracing::info!("Cleaning workspace");
        ws.host_mut().document.clean_db(true);
        for root in [
            ws.filters_root(),
            ws.plugins_root(),
            ws.bookmarks_root(),
            ws.comments_root(),
            ws.logs_root(),
        ] {
            ws.remove_all_children(root);
        }
        ws.set_workspace_file(None);
        ws.update_root_name();
    }

    /// Ask, then unload the log, plugins, filters and bookmarks and reset settings
    pub fn unload_all(&mut self, ws: &mut Workspace) -> bool {
        if !ws
            .host_mut()
            .prompt
            .confirm("Close workspace", "Do you want to close the log, filters and plugins?")
        {
            return false;
        }

        ws.remove_log();
        ws.close_all_plugins();
        ws.clear_filters();
        ws.remove_all_bookmarks();
        self.settings.restore_defaults();
        ws.set_workspace_file(None);
        ws.update_root_name();
        tracing::info!("Unloaded workspace");
        true
    }

    /// Write through a buffered file. Errors are logged and returned.
    fn write_file<F>(&self, path: &Utf8Path, body: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    {
        let result = File::create(path).map(BufWriter::new).and_then(|mut w| {
            body(&mut w)?;
            w.flush()
        });
        result.map_err(|source| {
            tracing::error!("Failed to write {}: {}", path, source);
            ConfigurationError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Write the workspace to `path`.
    ///
    /// As default, bookmarks and comments are left out and the workspace file
    /// name is kept.
    pub fn save_workspace_file(
        &mut self,
        ws: &mut Workspace,
        path: &Utf8Path,
        as_default: bool,
    ) -> Result<(), ConfigurationError> {
        let path = resolve(path, None);
        let mut options = SaveOptions::REL_PATH;
        if as_default {
            options = options | SaveOptions::TO_DEFAULT_WORKSPACE;
        }

        let base_dir = parent_dir(&path).map(Utf8Path::to_path_buf);
        let settings = self.settings.render(true);
        self.write_file(&path, |w| {
            let ctx = WriteContext::new(options, base_dir.as_deref());
            w.write_all(FILE_HEADER.as_bytes())?;
            w.write_all(PRODUCT_HEADER.as_bytes())?;
            w.write_all(settings.as_bytes())?;
            ws.write_workspace_body(w, &ctx)?;
            w.write_all(FILE_FOOTER.as_bytes())
        })?;

        if !as_default {
            ws.mark_filters_workspace_owned();
            ws.set_workspace_file(Some(path.clone()));
            ws.update_root_name();
        }
        self.recent.add(RecentFileKind::WorkspaceFile, &path, None);
        let db = self.recent_file_db.clone();
        if let Err(err) = self.save_recent_files(&db) {
            tracing::warn!("{}", err);
        }

        tracing::info!("Saved workspace file: {}", path);
        Ok(())
    }

    fn is_default_workspace(&self, path: &Utf8Path) -> bool {
        let default_name = self.config.default_workspace.as_str();
        !default_name.is_empty() && path.as_str().contains(default_name)
    }

    /// Save to the current workspace file; asks for a name when there is none
    /// or when the current file is the default workspace
    pub fn save_workspace(&mut self, ws: &mut Workspace) -> Result<(), ConfigurationError> {
        match ws.workspace_file().map(Utf8Path::to_path_buf) {
            Some(path) if !self.is_default_workspace(&path) => self.save_workspace_file(ws, &path, false),
            _ => self.save_workspace_as(ws),
        }
    }

    /// Ask for a workspace file name, proposing `<log stem>.lsz`
    pub fn save_workspace_as(&mut self, ws: &mut Workspace) -> Result<(), ConfigurationError> {
        let proposed = match ws.log_path() {
            Some(log) => log.with_extension("lsz"),
            None => Utf8PathBuf::from("workspace.lsz"),
        };
        let picked = ws.host_mut().prompt.pick_save_path("Save workspace", &proposed);
        match picked {
            Some(path) if !path.as_str().is_empty() => self.save_workspace_file(ws, &path, false),
            _ => Err(ConfigurationError::SaveCancelled),
        }
    }

    pub fn save_default_workspace(&mut self, ws: &mut Workspace) -> Result<(), ConfigurationError> {
        let path = self.default_workspace.clone();
        if let Some(dir) = parent_dir(&path)
            && !dir.exists()
        {
            std::fs::create_dir_all(dir).map_err(|source| ConfigurationError::Write {
                path: path.clone(),
                source,
            })?;
        }
        self.save_workspace_file(ws, &path, true)
    }

    /// Load the default workspace if there is one. Returns false when it doesn't exist.
    pub fn load_default_workspace(&mut self, ws: &mut Workspace) -> Result<bool, ConfigurationError> {
        let path = self.default_workspace.clone();
        if !self.can_open(ws, &path, false) {
            tracing::debug!("No default workspace at {}", path);
            return Ok(false);
        }
        tracing::info!("Load default workspace, path:{}", path);
        self.load_file_list(ws, &[path])?;
        Ok(true)
    }

    /// Read the recent file database, if present
    pub fn load_recent_files(&mut self, ws: &mut Workspace) -> Result<(), ConfigurationError> {
        let path = self.recent_file_db.clone();
        if !path.is_file() {
            return Ok(());
        }
        self.parse_file(ws, &path, ParseMode::Plain)
    }

    /// Write the recent file database
    pub fn save_recent_files(&self, path: &Utf8Path) -> Result<(), ConfigurationError> {
        let body = self.recent.render_body();
        self.write_file(path, |w| {
            w.write_all(FILE_HEADER.as_bytes())?;
            w.write_all(PRODUCT_HEADER.as_bytes())?;
            w.write_all(body.as_bytes())?;
            w.write_all(FILE_FOOTER.as_bytes())
        })
    }

    /// Write one filter to `path` and make that its file name
    pub fn save_filter_file(
        &mut self,
        ws: &mut Workspace,
        filter: NodeId,
        path: &Utf8Path,
    ) -> Result<(), ConfigurationError> {
        if ws.node(filter).and_then(CfgNode::filter).is_none() {
            return Err(ConfigurationError::NotAFilter(filter));
        }
        let path = resolve(path, None);
        ws.set_filter_file_name(filter, &path);

        let base_dir = parent_dir(&path).map(Utf8Path::to_path_buf);
        self.write_file(&path, |w| {
            let ctx = WriteContext::new(SaveOptions::REL_PATH, base_dir.as_deref());
            w.write_all(FILE_HEADER.as_bytes())?;
            w.write_all(PRODUCT_HEADER.as_bytes())?;
            ws.write_filter(filter, w, &ctx)?;
            w.write_all(FILE_FOOTER.as_bytes())
        })?;

        self.recent.add(RecentFileKind::FilterFile, &path, None);
        let db = self.recent_file_db.clone();
        if let Err(err) = self.save_recent_files(&db) {
            tracing::warn!("{}", err);
        }
        tracing::info!("Saved filter file: {}", path);
        Ok(())
    }

    /// Save a filter to its own file; a filter without a real file asks for one
    pub fn save_filter(&mut self, ws: &mut Workspace, filter: NodeId) -> Result<(), ConfigurationError> {
        let file = ws
            .node(filter)
            .and_then(CfgNode::filter)
            .map(|f| f.file_name().to_path_buf())
            .ok_or(ConfigurationError::NotAFilter(filter))?;

        if file.is_absolute() {
            self.save_filter_file(ws, filter, &file)
        } else {
            self.save_filter_as(ws, filter)
        }
    }

    /// Ask for a filter file name, proposing `<current stem>.flt`
    pub fn save_filter_as(&mut self, ws: &mut Workspace, filter: NodeId) -> Result<(), ConfigurationError> {
        let file = ws
            .node(filter)
            .and_then(CfgNode::filter)
            .map(|f| f.file_name().to_path_buf())
            .ok_or(ConfigurationError::NotAFilter(filter))?;

        let proposed = file.with_extension("flt");
        let picked = ws.host_mut().prompt.pick_save_path("Save filter", &proposed);
        match picked {
            Some(path) if !path.as_str().is_empty() => self.save_filter_file(ws, filter, &path),
            _ => Err(ConfigurationError::SaveCancelled),
        }
    }

    /// The filter file of `filter` still exists
    pub fn is_reload_possible(&self, ws: &Workspace, filter: NodeId) -> bool {
        ws.node(filter)
            .and_then(CfgNode::filter)
            .is_some_and(|f| f.file_name().is_file())
    }

    /// Re-read a filter from its file, keeping the node
    pub fn reload_filter(&mut self, ws: &mut Workspace, filter: NodeId) -> Result<(), ConfigurationError> {
        let file = ws
            .node(filter)
            .and_then(CfgNode::filter)
            .map(|f| f.file_name().to_path_buf())
            .ok_or(ConfigurationError::NotAFilter(filter))?;

        if !self.can_open(ws, &file, true) {
            tracing::error!("Reloading filter file failed, couldn't open file: {}", file);
            return Err(ConfigurationError::CannotOpen(file));
        }

        tracing::info!("Reloading filter file {}", file);
        self.parse_file(ws, &file, ParseMode::Reload { target: filter, file: file.clone() })
    }

    /// Let the user pick a file and load it
    fn open_picked(&mut self, ws: &mut Workspace, title: &str, extensions: &[&str]) -> bool {
        let extensions: Vec<String> = extensions.iter().map(|e| e.to_string()).collect();
        let Some(path) = ws.host_mut().prompt.pick_open_path(title, &extensions) else {
            return false;
        };
        match self.load_file_list(ws, &[path]) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{}", err);
                false
            }
        }
    }

    fn report(result: Result<(), ConfigurationError>) -> bool {
        match result {
            Ok(()) => true,
            Err(ConfigurationError::SaveCancelled) => false,
            Err(err) => {
                tracing::error!("{}", err);
                false
            }
        }
    }

    /// Run a menu action, including the ones that read or write files
    pub fn perform(&mut self, ws: &mut Workspace, action: &MenuAction) -> bool {
        match action {
            MenuAction::SaveWorkspace => Self::report(self.save_workspace(ws)),
            MenuAction::SaveWorkspaceAs => Self::report(self.save_workspace_as(ws)),
            MenuAction::SaveDefaultWorkspace => Self::report(self.save_default_workspace(ws)),
            MenuAction::CloseWorkspace => self.unload_all(ws),
            MenuAction::OpenFilterFile => self.open_picked(ws, "Open filter file", &["flt", "tat"]),
            MenuAction::OpenLogFile => self.open_picked(ws, "Open log file", &["txt", "log"]),
            MenuAction::OpenPlugin => {
                let extension = self.config.plugin_extension.clone();
                self.open_picked(ws, "Open plugin", &[extension.as_str()])
            }
            MenuAction::ReloadFilter(id) => Self::report(self.reload_filter(ws, *id)),
            MenuAction::SaveFilter(id) => {
                let is_default = ws
                    .node(*id)
                    .and_then(CfgNode::filter)
                    .is_some_and(|f| f.file_name().as_str().contains(DEFAULT_FILTER_MARKER));
                if is_default {
                    tracing::warn!("Filter {} belongs to the default workspace, use save as", id);
                    return false;
                }
                Self::report(self.save_filter(ws, *id))
            }
            MenuAction::SaveFilterAs(id) => Self::report(self.save_filter_as(ws, *id)),
            other => ws.perform(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::host::{Host, MockPrompt};
    use crate::tree::ItemKind;
    use crate::view::NullViewSink;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Utf8PathBuf, ConfigurationController, Workspace, HeadlessHost) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let dir = resolve(&dir, None);
        let controller = ConfigurationController::new(
            AppConfig::default(),
            dir.join("default_workspace.lsz"),
            dir.join("recent_files.rcnt"),
        );
        let host = HeadlessHost::new();
        let ws = Workspace::new(host.host(), Box::new(NullViewSink));
        (temp_dir, dir, controller, ws, host)
    }

    fn document(body: &str) -> String {
        format!("{}{}{}{}", FILE_HEADER, PRODUCT_HEADER, body, FILE_FOOTER)
    }

    fn item_texts(ws: &Workspace, filter: NodeId) -> Vec<String> {
        ws.filter_item_nodes(filter)
            .into_iter()
            .map(|id| ws.node(id).unwrap().text().to_string())
            .collect()
    }

    #[test]
    fn test_filter_file_attributes() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let path = dir.join("a.flt");
        fs::write(
            &path,
            document(
                "  <filters name=\"other.flt\">\n    <filter enabled=\"n\" excluding=\"y\" color=\"ff\"  bg_color=\"0x00ff00\" type=\"matches_text\" case_sensitive=\"y\" regex=\"n\" adaptive_clip=\"y\" text=\"he said \\\"hi\\\"\" />\n  </filters>\n",
            ),
        )
        .unwrap();

        ctrl.load_file(&mut ws, &path).unwrap();

        let filter = ws.filter_nodes()[0];
        assert_eq!(ws.node(filter).unwrap().filter().unwrap().file_name(), path);
        let item = ws.node(ws.filter_item_nodes(filter)[0]).unwrap().filter_item().unwrap().clone();
        assert!(!item.enabled);
        assert!(item.exclude);
        assert!(item.case_sensitive);
        assert!(!item.regex);
        assert!(item.adaptive_clip);
        assert_eq!(item.color, 0xff);
        assert_eq!(item.bg_color, 0x00ff00);
        assert_eq!(item.text(), "he said \"hi\"");
    }

    #[test]
    fn test_unknown_section_aborts() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let path = dir.join("bad.flt");
        fs::write(&path, document("  <nonsense>\n  </nonsense>\n")).unwrap();

        let err = ctrl.load_file(&mut ws, &path).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Parse {
                source: ParseError::UnknownTag { .. },
                ..
            }
        ));
        assert_eq!(ctrl.pool().outstanding(), 0);
    }

    #[test]
    fn test_unknown_item_tag_aborts() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let path = dir.join("bad.lsz");
        fs::write(&path, document("  <logs>\n    <filter path=\"x\" />\n  </logs>\n")).unwrap();
        assert!(ctrl.load_file(&mut ws, &path).is_err());
    }

    #[test]
    fn test_legacy_root_and_version_mismatch_tolerated() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let path = dir.join("old.tat");
        let body = format!(
            "{}<TextAnalysisTool.NET version=\"1\">\n  <filters>\n    <filter text=\"x\" />\n  </filters>\n</TextAnalysisTool.NET>\n",
            FILE_HEADER
        );
        fs::write(&path, body).unwrap();

        ctrl.load_file(&mut ws, &path).unwrap();
        assert_eq!(ws.filter_nodes().len(), 1);
    }

    #[test]
    fn test_empty_file_rejected() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let path = dir.join("empty.flt");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            ctrl.load_file(&mut ws, &path),
            Err(ConfigurationError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_missing_file_warns() {
        let (_tmp, dir, mut ctrl, mut ws, host) = setup();
        let result = ctrl.load_file(&mut ws, &dir.join("gone.flt"));
        assert!(matches!(result, Err(ConfigurationError::CannotOpen(_))));
        assert_eq!(host.prompt.with_state(|s| s.warnings.len()), 1);
    }

    #[test]
    fn test_settings_and_recent_files_parsed() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let log = dir.join("a.log");
        fs::write(&log, "1\n").unwrap();
        let db = dir.join("recent.rcnt");
        fs::write(
            &db,
            document(&format!(
                "  <settings>\n    <setting  NUM_OF_THREADS=\"8\"/>\n  </settings>\n<recentfiles>\n  <recentfile path=\"{}\" kind=\"0\" timestamp=\"42\" />\n</recentfiles>\n",
                log
            )),
        )
        .unwrap();

        ctrl.load_file(&mut ws, &db).unwrap();
        assert_eq!(ctrl.settings().get("NUM_OF_THREADS"), Some("8"));
        let entry = ctrl.recent_files().get(&log).unwrap();
        assert_eq!(entry.kind, RecentFileKind::LogFile);
        assert_eq!(entry.last_accessed, 42);
        assert!(!dir.join("recent_files.rcnt").exists());
    }

    #[test]
    fn test_workspace_load_marks_filters_and_sets_name() {
        let (_tmp, dir, mut ctrl, mut ws, host) = setup();
        fs::write(dir.join("a.log"), "1\n2\n3\n").unwrap();
        let path = dir.join("ws.lsz");
        fs::write(
            &path,
            document(
                "  <logs>\n    <log path=\"a.log\" />\n  </logs>\n  <filters name=\"x.flt\">\n    <filter text=\"err\" />\n  </filters>\n  <bookmarks>\n    <bookmark row=\"2\" text=\"here\" />\n  </bookmarks>\n",
            ),
        )
        .unwrap();

        ctrl.load_file_list(&mut ws, &[path.clone()]).unwrap();

        assert_eq!(ws.workspace_file(), Some(path.as_path()));
        assert_eq!(ws.node(ws.root()).unwrap().text(), "Workspace - ws.lsz");
        assert_eq!(ws.log_path(), Some(dir.join("a.log").as_path()));
        let filter = ws.filter_nodes()[0];
        assert_eq!(ws.node(filter).unwrap().text(), "x.flt #workspace");
        assert_eq!(ws.bookmark_rows(), vec![2]);
        assert_eq!(host.document.with_state(|s| s.clean_db_calls), 1);
        assert!(ws.selection_enabled());
    }

    #[test]
    fn test_reload_keeps_node() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let path = dir.join("r.flt");
        fs::write(&path, document("  <filters>\n    <filter text=\"one\" />\n  </filters>\n")).unwrap();
        ctrl.load_file(&mut ws, &path).unwrap();
        let filter = ws.filter_nodes()[0];
        assert!(ctrl.is_reload_possible(&ws, filter));

        fs::write(
            &path,
            document("  <filters>\n    <filter text=\"two\" />\n    <filter text=\"three\" />\n  </filters>\n"),
        )
        .unwrap();
        ctrl.reload_filter(&mut ws, filter).unwrap();

        assert_eq!(ws.filter_nodes(), vec![filter]);
        assert_eq!(item_texts(&ws, filter), vec!["two", "three"]);
    }

    #[test]
    fn test_save_filter_as_cancelled() {
        let mut prompt = MockPrompt::new();
        prompt.expect_pick_save_path().times(1).returning(|_, _| None);

        let (_tmp, _dir, mut ctrl, _ws, headless) = setup();
        let host = Host {
            prompt: Box::new(prompt),
            ..headless.host()
        };
        let mut ws = Workspace::new(host, Box::new(NullViewSink));
        let filter = ws.create_cfg_filter(None);

        assert!(matches!(
            ctrl.save_filter(&mut ws, filter),
            Err(ConfigurationError::SaveCancelled)
        ));
    }

    #[test]
    fn test_save_filter_writes_relative_name() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let filter = ws.create_cfg_filter(None);
        ws.add_filter_item(Some("abc"), None, Some(filter)).unwrap();

        let path = dir.join("saved.flt");
        ctrl.save_filter_file(&mut ws, filter, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(FILE_HEADER));
        assert!(text.contains("  <filters name=\"saved.flt\">\n"));
        assert!(text.ends_with(FILE_FOOTER));
        assert_eq!(ws.node(filter).unwrap().text(), "saved.flt");
        assert!(ctrl.recent_files().get(&path).is_some());
    }

    #[test]
    fn test_backslash_texts_survive_save_and_load() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let texts = ["foo\\", "second", "say \\\"hi\\\"", "C:\\logs\\"];
        let filter = ws.create_cfg_filter(None);
        for text in texts {
            ws.add_filter_item(Some(text), None, Some(filter)).unwrap();
        }
        let path = dir.join("backslash.flt");
        ctrl.save_filter_file(&mut ws, filter, &path).unwrap();

        let host = HeadlessHost::new();
        let mut loaded = Workspace::new(host.host(), Box::new(NullViewSink));
        ctrl.load_file(&mut loaded, &path).unwrap();

        let reloaded = loaded.filter_nodes()[0];
        assert_eq!(item_texts(&loaded, reloaded), texts);
    }

    #[test]
    fn test_failed_workspace_save_keeps_filter_names() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let filter = ws.create_cfg_filter(Some(Filter::with_file_name(dir.join("keep.flt"))));

        let unwritable = dir.join("missing").join("session.lsz");
        assert!(matches!(
            ctrl.save_workspace_file(&mut ws, &unwritable, false),
            Err(ConfigurationError::Write { .. })
        ));
        assert_eq!(ws.node(filter).unwrap().text(), "keep.flt");
        assert_eq!(ws.workspace_file(), None);

        ctrl.save_workspace_file(&mut ws, &dir.join("session.lsz"), false).unwrap();
        assert_eq!(ws.node(filter).unwrap().text(), "keep.flt #workspace");
    }

    #[test]
    fn test_save_workspace_uses_picked_path() {
        let (_tmp, dir, mut ctrl, mut ws, host) = setup();
        let target = dir.join("picked.lsz");
        host.prompt.queue_save_path(Some(target.clone()));

        ctrl.save_workspace(&mut ws).unwrap();
        assert!(target.is_file());
        assert_eq!(ws.workspace_file(), Some(target.as_path()));
        assert!(dir.join("recent_files.rcnt").is_file());
    }

    #[test]
    fn test_default_workspace_roundtrip() {
        let (_tmp, dir, mut ctrl, mut ws, host) = setup();
        assert!(!ctrl.load_default_workspace(&mut ws).unwrap());

        let filter = ws.create_cfg_filter(None);
        ws.add_filter_item(Some("keep"), None, Some(filter)).unwrap();
        ctrl.settings_mut().set("WORK_MEM_SIZE", "64");
        ctrl.save_default_workspace(&mut ws).unwrap();
        assert_eq!(ws.workspace_file(), None);

        let mut fresh = Workspace::new(host.host(), Box::new(NullViewSink));
        ctrl.settings_mut().restore_defaults();
        assert!(ctrl.load_default_workspace(&mut fresh).unwrap());
        assert_eq!(ctrl.settings().get("WORK_MEM_SIZE"), Some("64"));
        assert_eq!(item_texts(&fresh, fresh.filter_nodes()[0]), vec!["keep"]);
        assert!(dir.join("default_workspace.lsz").is_file());
    }

    #[test]
    fn test_unload_all_needs_confirmation() {
        let (_tmp, _dir, mut ctrl, mut ws, host) = setup();
        ws.create_cfg_filter(None);
        ctrl.settings_mut().set("THREAD_PRIO", "2");

        host.prompt.queue_confirm(false);
        assert!(!ctrl.unload_all(&mut ws));
        assert_eq!(ws.filter_nodes().len(), 1);

        assert!(ctrl.unload_all(&mut ws));
        assert!(ws.filter_nodes().is_empty());
        assert!(ctrl.settings().is_default("THREAD_PRIO"));
    }

    #[test]
    fn test_unsupported_extension_warns_and_continues() {
        let (_tmp, dir, mut ctrl, mut ws, host) = setup();
        let odd = dir.join("notes.md");
        let log = dir.join("b.log");
        fs::write(&odd, "x").unwrap();
        fs::write(&log, "x\n").unwrap();

        ctrl.load_file_list(&mut ws, &[odd, log.clone()]).unwrap();
        assert_eq!(ws.log_path(), Some(log.as_path()));
        assert_eq!(host.prompt.with_state(|s| s.warnings.len()), 1);
        assert_eq!(
            ws.tree().kind(ws.tree().children(ws.logs_root())[0]),
            Some(ItemKind::Log)
        );
    }

    #[test]
    fn test_menu_save_filter_blocked_for_default_filter() {
        let (_tmp, dir, mut ctrl, mut ws, _host) = setup();
        let filter = ws.create_cfg_filter(Some(Filter::with_file_name(dir.join("default_filter.flt"))));
        assert!(!ctrl.perform(&mut ws, &MenuAction::SaveFilter(filter)));
        assert!(!dir.join("default_filter.flt").exists());
    }
}
