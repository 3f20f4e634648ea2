use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// 0x00RRGGBB color value
pub type Rgb = u32;

/// Pack red, green and blue into an [`Rgb`]
pub const fn q_rgb(r: u8, g: u8, b: u8) -> Rgb {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Default foreground color of a filter item
pub const BLACK: Rgb = q_rgb(0, 0, 0);

/// Default background color of a filter item
pub const BACKGROUND_COLOR: Rgb = q_rgb(255, 250, 240);

/// Marker appended to the short name of filters owned by a workspace
pub const WORKSPACE_MARKER: &str = "#workspace";

static NEXT_UNIQUE_ID: AtomicU32 = AtomicU32::new(1);

static HEX_COLOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:0[xX])?([0-9a-fA-F]+)").expect("Invalid hex color regex")
});

fn next_unique_id() -> u32 {
    NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Parse a color attribute value.
///
/// The `0x` prefix is optional. Parsing stops at the first non-hex character,
/// and at most 8 digits are considered.
pub fn parse_hex_color(value: &str) -> Option<Rgb> {
    let caps = HEX_COLOR_PATTERN.captures(value)?;
    let digits = caps.get(1)?.as_str();
    let digits = &digits[..digits.len().min(8)];
    u32::from_str_radix(digits, 16).ok()
}

/// A single text match rule of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterItem {
    /// Cross reference between the tree and the filtering engine
    pub unique_id: u32,
    text: Vec<u8>,
    pub enabled: bool,
    pub exclude: bool,
    pub case_sensitive: bool,
    pub regex: bool,
    pub adaptive_clip: bool,
    pub color: Rgb,
    pub bg_color: Rgb,
    /// Quick search key bound to this item, if any
    pub quick_search: Option<char>,
}

impl Default for FilterItem {
    fn default() -> Self {
        Self {
            unique_id: next_unique_id(),
            text: Vec::new(),
            enabled: true,
            exclude: false,
            case_sensitive: false,
            regex: false,
            adaptive_clip: false,
            color: BLACK,
            bg_color: BACKGROUND_COLOR,
            quick_search: None,
        }
    }
}

impl FilterItem {
    /// Create an enabled filter item matching `text`
    pub fn new(text: &str) -> Self {
        let mut item = Self::default();
        item.set_text(text);
        item
    }

    /// Raw match text, not null terminated
    pub fn text_bytes(&self) -> &[u8] {
        &self.text
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }

    /// Replace the match text buffer
    pub fn set_text(&mut self, text: &str) {
        self.text = text.as_bytes().to_vec();
    }

    pub fn set_text_bytes(&mut self, bytes: Vec<u8>) {
        self.text = bytes;
    }

    /// Copy of this item with a fresh unique id and no quick search binding
    pub fn duplicate(&self) -> Self {
        Self {
            unique_id: next_unique_id(),
            quick_search: None,
            text: self.text.clone(),
            ..*self
        }
    }

    /// Append the big-endian field block used by the transfer stream and the
    /// filter hash. The case flag appears twice, matching the stream layout.
    pub fn pack_fields(&self, out: &mut Vec<u8>) {
        out.push(self.enabled as u8);
        out.push(self.exclude as u8);
        out.extend_from_slice(&self.color.to_be_bytes());
        out.extend_from_slice(&self.bg_color.to_be_bytes());
        out.push(self.case_sensitive as u8);
        out.push(self.regex as u8);
        out.push(self.adaptive_clip as u8);
        out.push(self.case_sensitive as u8);
        out.extend_from_slice(&(self.text.len() as i32).to_be_bytes());
        out.extend_from_slice(&self.text);
    }

    /// Compare every persisted field, ignoring identity and quick search
    pub fn same_rule(&self, other: &FilterItem) -> bool {
        self.text == other.text
            && self.enabled == other.enabled
            && self.exclude == other.exclude
            && self.case_sensitive == other.case_sensitive
            && self.regex == other.regex
            && self.adaptive_clip == other.adaptive_clip
            && self.color == other.color
            && self.bg_color == other.bg_color
    }
}

/// A filter file: identity plus a transient list of items.
///
/// Once the items have been moved into tree nodes the list is empty; the
/// tree owns the items from then on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    file_name: Utf8PathBuf,
    short_name: String,
    items: Vec<FilterItem>,
}

impl Filter {
    pub const PLACEHOLDER_FILE: &'static str = "New_Filter.flt";
    pub const PLACEHOLDER_NAME: &'static str = "New_Filter";

    /// Empty filter with the placeholder file name used for new filters
    pub fn placeholder() -> Self {
        Self {
            file_name: Utf8PathBuf::from(Self::PLACEHOLDER_FILE),
            short_name: Self::PLACEHOLDER_NAME.to_string(),
            items: Vec::new(),
        }
    }

    pub fn with_file_name<P: AsRef<Utf8Path>>(path: P) -> Self {
        let mut filter = Self::default();
        filter.set_file_name(path);
        filter
    }

    /// Set the file name; the short name becomes the file name without directory
    pub fn set_file_name<P: AsRef<Utf8Path>>(&mut self, path: P) {
        let path = path.as_ref();
        self.file_name = path.to_path_buf();
        self.short_name = path.file_name().unwrap_or(path.as_str()).to_string();
    }

    pub fn file_name(&self) -> &Utf8Path {
        &self.file_name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn set_short_name(&mut self, name: impl Into<String>) {
        self.short_name = name.into();
    }

    /// Append the workspace marker to the short name unless already present
    pub fn mark_workspace_owned(&mut self) {
        if !self.short_name.contains(WORKSPACE_MARKER) {
            self.short_name.push(' ');
            self.short_name.push_str(WORKSPACE_MARKER);
        }
    }

    pub fn items(&self) -> &[FilterItem] {
        &self.items
    }

    pub fn push_item(&mut self, item: FilterItem) {
        self.items.push(item);
    }

    /// Move all items out, leaving the list empty
    pub fn take_items(&mut self) -> Vec<FilterItem> {
        std::mem::take(&mut self.items)
    }
}
