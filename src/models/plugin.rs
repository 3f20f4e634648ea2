use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write;

/// Capability bits advertised by a plugin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportedFeatures(u32);

impl SupportedFeatures {
    pub const NONE: SupportedFeatures = SupportedFeatures(0);
    pub const PLOT: SupportedFeatures = SupportedFeatures(1 << 2);
    pub const DECODER: SupportedFeatures = SupportedFeatures(1 << 5);
    pub const HELP_URL: SupportedFeatures = SupportedFeatures(1 << 6);
    pub const PLOT_TIME: SupportedFeatures = SupportedFeatures(1 << 7);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: SupportedFeatures) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SupportedFeatures {
    type Output = SupportedFeatures;

    fn bitor(self, rhs: SupportedFeatures) -> SupportedFeatures {
        SupportedFeatures(self.0 | rhs.0)
    }
}

/// Information block reported by a loaded plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub author: String,
    pub version: String,
    pub help_url: String,
    pub features: SupportedFeatures,
}

impl PluginInfo {
    /// Multi-line description shown by the "Info" menu entry
    pub fn describe(&self) -> String {
        let mut info = format!(
            "  Name: {}\n  Author:  {}\n  Version: {}\n",
            self.name, self.author, self.version
        );
        if self.features.contains(SupportedFeatures::HELP_URL) {
            let _ = writeln!(info, "  Help: {}", self.help_url);
        }

        info.push_str("  Supported features\n");
        if self.features.contains(SupportedFeatures::PLOT) {
            info.push_str("    Plot\n");
        }
        if self.features.contains(SupportedFeatures::DECODER) {
            info.push_str("    Decoder\n");
        }
        if self.features.contains(SupportedFeatures::HELP_URL) {
            info.push_str("    Help URL\n");
        }
        info
    }
}

/// A sub-plot of a plot. Sequence sub-plots produce sequence diagrams
/// instead of graphs when the plot is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPlotDescriptor {
    pub name: String,
    pub sequence: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotDescriptor {
    pub name: String,
    pub subplots: Vec<SubPlotDescriptor>,
}

/// A loaded plugin library, owned by its tree node until unloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginHandle {
    /// Host specific library identity
    pub library_id: u64,
    pub path: Utf8PathBuf,
    pub info: PluginInfo,
    pub decoders: Vec<String>,
    pub plots: Vec<PlotDescriptor>,
}

impl PluginHandle {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// File name of the library, without directory
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }
}
