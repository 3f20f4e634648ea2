//! File system backed collaborators for running without a GUI.
//!
//! Every type here is a cheap handle around shared state: clone it before
//! handing it to a [`Host`] and keep the clone to inspect what happened.

use crate::host::{Document, Host, PluginHost, PluginLoadError, Prompt, SelectionSource};
use crate::models::{FilterItem, PluginHandle, PluginInfo, Rgb, SupportedFeatures};
use crate::tree::NodeId;
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct DocumentState {
    pub log: Option<Utf8PathBuf>,
    pub rows: usize,
    pub refiltered_rows: Vec<(usize, bool)>,
    pub decoders: Vec<String>,
    pub quick_searches: Vec<(String, bool, bool, bool)>,
    pub updated_filter_items: Vec<u32>,
    pub clean_db_calls: usize,
    pub row_cache_cleans: usize,
    pub plugin_unloaded_calls: usize,
    pub goto_rows: Vec<usize>,
}

/// Document that counts the rows of the loaded log file
#[derive(Clone, Default)]
pub struct HeadlessDocument {
    state: Rc<RefCell<DocumentState>>,
}

impl HeadlessDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the shared state
    pub fn with_state<R>(&self, f: impl FnOnce(&DocumentState) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Pretend a log with `rows` rows is loaded
    pub fn set_row_count(&self, rows: usize) {
        self.state.borrow_mut().rows = rows;
    }
}

fn count_rows(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|b| **b == b'\n').count();
    if bytes.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

impl Document for HeadlessDocument {
    fn load_log(&mut self, path: &Utf8Path) -> bool {
        match fs::read(path) {
            Ok(bytes) => {
                let mut state = self.state.borrow_mut();
                state.rows = count_rows(&bytes);
                state.log = Some(path.to_path_buf());
                tracing::info!("Loaded log {} ({} rows)", path, state.rows);
                true
            }
            Err(err) => {
                tracing::warn!("Failed to load log {}: {}", path, err);
                false
            }
        }
    }

    fn clean_db(&mut self, _keep_filters: bool) {
        let mut state = self.state.borrow_mut();
        state.clean_db_calls += 1;
        state.log = None;
        state.rows = 0;
    }

    fn row_count(&self) -> usize {
        self.state.borrow().rows
    }

    fn file_size(&self, path: &Utf8Path) -> u64 {
        fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    fn start_one_line_filtering(&mut self, row: usize, is_removal: bool) {
        self.state
            .borrow_mut()
            .refiltered_rows
            .push((row, is_removal));
    }

    fn update_filter_item(&mut self, unique_id: u32, _color: Rgb, _bg_color: Rgb) {
        self.state.borrow_mut().updated_filter_items.push(unique_id);
    }

    fn add_decoders(&mut self, decoders: &[String]) {
        self.state
            .borrow_mut()
            .decoders
            .extend(decoders.iter().cloned());
    }

    fn remove_decoder(&mut self, name: &str) {
        self.state.borrow_mut().decoders.retain(|d| d != name);
    }

    fn clean_row_cache(&mut self) {
        self.state.borrow_mut().row_cache_cleans += 1;
    }

    fn plugin_unloaded(&mut self) {
        self.state.borrow_mut().plugin_unloaded_calls += 1;
    }

    fn quick_search(&mut self, text: &str, forward: bool, case_sensitive: bool, regex: bool) {
        self.state.borrow_mut().quick_searches.push((
            text.to_string(),
            forward,
            case_sensitive,
            regex,
        ));
    }

    fn goto_row(&mut self, row: usize) {
        self.state.borrow_mut().goto_rows.push(row);
    }
}

/// What a plugin provides, used to prime [`HeadlessPluginHost`]
#[derive(Debug, Clone, Default)]
pub struct PluginManifest {
    pub info: PluginInfo,
    pub decoders: Vec<String>,
    pub plots: Vec<crate::models::PlotDescriptor>,
}

#[derive(Debug, Default)]
pub struct PluginHostState {
    manifests: HashMap<Utf8PathBuf, PluginManifest>,
    next_library_id: u64,
    pub loaded: Vec<Utf8PathBuf>,
    pub unloaded: Vec<Utf8PathBuf>,
    pub detached_plots: Vec<String>,
    pub runs: Vec<String>,
}

/// Plugin host that describes plugin files without loading code.
///
/// Files with a registered manifest report it; any other existing file is
/// reported as a plugin named after the file stem with no features.
#[derive(Clone, Default)]
pub struct HeadlessPluginHost {
    state: Rc<RefCell<PluginHostState>>,
}

impl HeadlessPluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: AsRef<Utf8Path>>(&self, path: P, manifest: PluginManifest) {
        self.state
            .borrow_mut()
            .manifests
            .insert(path.as_ref().to_path_buf(), manifest);
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&PluginHostState) -> R) -> R {
        f(&self.state.borrow())
    }
}

impl PluginHost for HeadlessPluginHost {
    fn load_library(&mut self, path: &Utf8Path) -> Result<PluginHandle, PluginLoadError> {
        if !path.is_file() {
            return Err(PluginLoadError::NotFound(path.to_path_buf()));
        }

        let mut state = self.state.borrow_mut();
        let manifest = state.manifests.get(path).cloned().unwrap_or_else(|| PluginManifest {
            info: PluginInfo {
                name: path.file_stem().unwrap_or("plugin").to_string(),
                author: "unknown".to_string(),
                version: "1.0".to_string(),
                help_url: String::new(),
                features: SupportedFeatures::NONE,
            },
            ..PluginManifest::default()
        });

        state.next_library_id += 1;
        state.loaded.push(path.to_path_buf());

        Ok(PluginHandle {
            library_id: state.next_library_id,
            path: path.to_path_buf(),
            info: manifest.info,
            decoders: manifest.decoders,
            plots: manifest.plots,
        })
    }

    fn unload(&mut self, handle: &PluginHandle) {
        self.state.borrow_mut().unloaded.push(handle.path.clone());
    }

    fn detach_plot(&mut self, plot: &str) {
        self.state.borrow_mut().detached_plots.push(plot.to_string());
    }

    fn run_plot(&mut self, plugin: &PluginHandle, plot: &str) -> Vec<Vec<String>> {
        self.state.borrow_mut().runs.push(plot.to_string());
        plugin
            .plots
            .iter()
            .find(|p| p.name == plot)
            .map(|p| {
                p.subplots
                    .iter()
                    .map(|sub| vec![format!("{} graph", sub.name)])
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct PromptState {
    pub text_answers: VecDeque<Option<String>>,
    pub filter_answers: VecDeque<Option<FilterItem>>,
    pub confirm_answers: VecDeque<bool>,
    pub open_answers: VecDeque<Option<Utf8PathBuf>>,
    pub save_answers: VecDeque<Option<Utf8PathBuf>>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
    pub opened_urls: Vec<String>,
}

/// Prompt answering from queued responses.
///
/// With nothing queued every dialog is accepted with its initial value and
/// every confirmation is granted.
#[derive(Clone, Default)]
pub struct ScriptedPrompt {
    state: Rc<RefCell<PromptState>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_text(&self, answer: Option<&str>) {
        self.state
            .borrow_mut()
            .text_answers
            .push_back(answer.map(str::to_string));
    }

    pub fn queue_filter_edit(&self, answer: Option<FilterItem>) {
        self.state.borrow_mut().filter_answers.push_back(answer);
    }

    pub fn queue_confirm(&self, answer: bool) {
        self.state.borrow_mut().confirm_answers.push_back(answer);
    }

    pub fn queue_open_path(&self, answer: Option<Utf8PathBuf>) {
        self.state.borrow_mut().open_answers.push_back(answer);
    }

    pub fn queue_save_path(&self, answer: Option<Utf8PathBuf>) {
        self.state.borrow_mut().save_answers.push_back(answer);
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&PromptState) -> R) -> R {
        f(&self.state.borrow())
    }
}

impl Prompt for ScriptedPrompt {
    fn text_input(&mut self, _title: &str, _label: &str, initial: &str) -> Option<String> {
        self.state
            .borrow_mut()
            .text_answers
            .pop_front()
            .unwrap_or_else(|| Some(initial.to_string()))
    }

    fn edit_filter_item(&mut self, item: &FilterItem) -> Option<FilterItem> {
        self.state
            .borrow_mut()
            .filter_answers
            .pop_front()
            .unwrap_or_else(|| Some(item.clone()))
    }

    fn confirm(&mut self, _title: &str, _message: &str) -> bool {
        self.state
            .borrow_mut()
            .confirm_answers
            .pop_front()
            .unwrap_or(true)
    }

    fn pick_open_path(&mut self, _title: &str, _extensions: &[String]) -> Option<Utf8PathBuf> {
        self.state.borrow_mut().open_answers.pop_front().flatten()
    }

    fn pick_save_path(&mut self, _title: &str, proposed: &Utf8Path) -> Option<Utf8PathBuf> {
        self.state
            .borrow_mut()
            .save_answers
            .pop_front()
            .unwrap_or_else(|| Some(proposed.to_path_buf()))
    }

    fn warn(&mut self, title: &str, message: &str) {
        tracing::warn!("{}: {}", title, message);
        self.state.borrow_mut().warnings.push(message.to_string());
    }

    fn show_info(&mut self, title: &str, message: &str) {
        tracing::info!("{}: {}", title, message);
        self.state.borrow_mut().infos.push(message.to_string());
    }

    fn open_url(&mut self, url: &str) {
        self.state.borrow_mut().opened_urls.push(url.to_string());
    }
}

/// Selection held in memory
#[derive(Clone, Default)]
pub struct HeadlessSelection {
    selected: Rc<RefCell<Vec<NodeId>>>,
}

impl HeadlessSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection
    pub fn set(&self, nodes: &[NodeId]) {
        *self.selected.borrow_mut() = nodes.to_vec();
    }
}

impl SelectionSource for HeadlessSelection {
    fn selected(&self) -> Vec<NodeId> {
        self.selected.borrow().clone()
    }

    fn select(&mut self, node: NodeId) {
        let mut selected = self.selected.borrow_mut();
        if !selected.contains(&node) {
            selected.push(node);
        }
    }

    fn unselect_all(&mut self) {
        self.selected.borrow_mut().clear();
    }
}

/// Handles to the collaborators of a headless [`Host`]
#[derive(Clone, Default)]
pub struct HeadlessHost {
    pub document: HeadlessDocument,
    pub plugins: HeadlessPluginHost,
    pub prompt: ScriptedPrompt,
    pub selection: HeadlessSelection,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a [`Host`] sharing state with these handles
    pub fn host(&self) -> Host {
        Host {
            document: Box::new(self.document.clone()),
            plugins: Box::new(self.plugins.clone()),
            prompt: Box::new(self.prompt.clone()),
            selection: Box::new(self.selection.clone()),
        }
    }
}
