use indexmap::IndexMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Setting {
    value: String,
    default: String,
}

/// Registered workspace settings, in registration order.
///
/// Only registered tags can be set; unknown tags from a workspace file are
/// reported and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    entries: IndexMap<String, Setting>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self::empty();
        for (tag, default) in [
            ("NUM_OF_THREADS", "4"),
            ("THREAD_PRIO", "0"),
            ("WORK_MEM_SIZE", "32"),
            ("PLOT_LINE_ENDS", "1"),
            ("PLOT_TEXT_FONT_SIZE", "10"),
            ("PLOT_GRAPH_LINE_SIZE", "1"),
            ("LOG_TEXT_GRAY_INTENSITY", "50"),
            ("SCROLL_ARROW_ICON_SCALE", "100"),
        ] {
            settings.register(tag, default);
        }
        settings
    }
}

impl Settings {
    /// Settings registry without any registered tag
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn register(&mut self, tag: &str, default: &str) {
        self.entries.insert(
            tag.to_string(),
            Setting {
                value: default.to_string(),
                default: default.to_string(),
            },
        );
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries.get(tag).map(|s| s.value.as_str())
    }

    /// Set a registered setting. Returns false for unknown tags.
    pub fn set(&mut self, tag: &str, value: &str) -> bool {
        match self.entries.get_mut(tag) {
            Some(setting) => {
                tracing::info!("SetSetting {} = {}", tag, value);
                setting.value = value.to_string();
                true
            }
            None => {
                tracing::warn!("Failed to find setting {}", tag);
                false
            }
        }
    }

    pub fn is_default(&self, tag: &str) -> bool {
        self.entries
            .get(tag)
            .is_none_or(|s| s.value == s.default)
    }

    /// Restore every setting to its default value
    pub fn restore_defaults(&mut self) {
        for setting in self.entries.values_mut() {
            setting.value = setting.default.clone();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `<settings>` section of a workspace file.
    ///
    /// With `only_changed` the settings still at their default are left out,
    /// but the section itself is written whenever anything is registered.
    pub fn render(&self, only_changed: bool) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut out = String::from("  <settings>\n");
        for (tag, setting) in &self.entries {
            if only_changed && setting.value == setting.default {
                continue;
            }
            let _ = writeln!(out, "    <setting  {}=\"{}\"/>", tag, setting.value);
        }
        out.push_str("  </settings>\n");
        out
    }
}
