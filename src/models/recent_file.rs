use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of a recently used file, stored numerically in the `.rcnt` database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecentFileKind {
    LogFile = 0,
    FilterFile = 1,
    PluginFile = 2,
    WorkspaceFile = 3,
}

impl RecentFileKind {
    pub fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::LogFile),
            1 => Some(Self::FilterFile),
            2 => Some(Self::PluginFile),
            3 => Some(Self::WorkspaceFile),
            _ => None,
        }
    }

    /// Classify a path by extension. Recent file databases are never recorded.
    pub fn for_path(path: &Utf8Path, plugin_extension: &str) -> Option<Self> {
        match path.extension() {
            Some("rcnt") => None,
            Some("txt") | Some("log") => Some(Self::LogFile),
            Some("lsz") => Some(Self::WorkspaceFile),
            Some("tat") | Some("flt") => Some(Self::FilterFile),
            Some(ext) if ext == plugin_extension => Some(Self::PluginFile),
            _ => Some(Self::LogFile),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentFile {
    pub kind: RecentFileKind,
    pub path: Utf8PathBuf,
    /// Seconds since the unix epoch
    pub last_accessed: i64,
}

impl RecentFile {
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or("")
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// History of recently used files, newest first
#[derive(Debug, Clone)]
pub struct RecentFiles {
    entries: Vec<RecentFile>,
    max_history: usize,
}

impl Default for RecentFiles {
    fn default() -> Self {
        Self::new(20)
    }
}

impl RecentFiles {
    pub fn new(max_history: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_history,
        }
    }

    pub fn entries(&self) -> &[RecentFile] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_max_history(&mut self, max_history: usize) {
        self.max_history = max_history;
        self.trim();
    }

    pub fn get(&self, path: &Utf8Path) -> Option<&RecentFile> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Record a file, classifying it by extension
    pub fn add_path(&mut self, path: &Utf8Path, plugin_extension: &str) {
        if let Some(kind) = RecentFileKind::for_path(path, plugin_extension) {
            self.add(kind, path, None);
        }
    }

    /// Record or refresh a file.
    ///
    /// Files that no longer exist are not added, and a stale entry for them is
    /// dropped. A supplied timestamp only moves an existing entry forward.
    pub fn add(&mut self, kind: RecentFileKind, path: &Utf8Path, timestamp: Option<i64>) {
        let exists = path.exists();

        if let Some(index) = self.entries.iter().position(|e| e.path == path) {
            if !exists {
                self.entries.remove(index);
                return;
            }
            let entry = &mut self.entries[index];
            match timestamp {
                Some(ts) if ts > entry.last_accessed => entry.last_accessed = ts,
                Some(_) => {}
                None => entry.last_accessed = now(),
            }
        } else {
            if !exists {
                tracing::debug!("Not adding missing file to recent files: {}", path);
                return;
            }
            self.entries.insert(
                0,
                RecentFile {
                    kind,
                    path: path.to_path_buf(),
                    last_accessed: timestamp.unwrap_or_else(now),
                },
            );
        }

        self.sort();
        self.trim();
    }

    pub fn remove(&mut self, path: &Utf8Path) -> bool {
        match self.entries.iter().position(|e| e.path == path) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => {
                tracing::warn!("File not found in recent files: {}", path);
                false
            }
        }
    }

    /// Newest first; equal timestamps keep their relative order
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
    }

    /// Drop the oldest entries beyond the configured history size
    pub fn trim(&mut self) {
        if self.entries.len() > self.max_history {
            tracing::debug!(
                "Removing {} items from recent file history",
                self.entries.len() - self.max_history
            );
            self.entries.truncate(self.max_history);
        }
    }

    /// Remove entries whose file no longer exists. Returns true if anything was removed.
    pub fn qualify_and_clean(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| {
            let valid = e.path.exists() && !e.file_name().is_empty();
            if !valid {
                tracing::info!("Recent file doesn't exist any more: {}", e.path);
            }
            valid
        });
        before != self.entries.len()
    }

    /// Most recent path of the given kind
    pub fn recent_path(&mut self, kind: RecentFileKind) -> Option<Utf8PathBuf> {
        self.qualify_and_clean();
        self.sort();
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.path.clone())
    }

    /// Unique paths (or their directories) of the given kinds, newest first per kind
    pub fn recent_paths(&mut self, kinds: &[RecentFileKind], dir_only: bool) -> Vec<Utf8PathBuf> {
        self.qualify_and_clean();
        self.sort();

        let mut paths: Vec<Utf8PathBuf> = Vec::new();
        for kind in kinds {
            for entry in self.entries.iter().filter(|e| e.kind == *kind) {
                let path = if dir_only {
                    match entry.path.parent() {
                        Some(parent) => parent.to_path_buf(),
                        None => continue,
                    }
                } else {
                    entry.path.clone()
                };
                if !path.as_str().is_empty() && !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// Body lines of the `.rcnt` database, without the document header/footer
    pub fn render_body(&self) -> String {
        let mut body = String::from("<recentfiles>\n");
        for entry in &self.entries {
            let _ = writeln!(
                body,
                "  <recentfile path=\"{}\" kind=\"{}\" timestamp=\"{}\" />",
                entry.path, entry.kind as i32, entry.last_accessed
            );
        }
        body.push_str("</recentfiles>\n");
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join(name)).unwrap();
        std::fs::write(&path, "x").unwrap();
        path
    }

    #[test]
    fn test_kind_for_path() {
        assert_eq!(
            RecentFileKind::for_path(Utf8Path::new("a.log"), "so"),
            Some(RecentFileKind::LogFile)
        );
        assert_eq!(
            RecentFileKind::for_path(Utf8Path::new("a.so"), "so"),
            Some(RecentFileKind::PluginFile)
        );
        assert_eq!(
            RecentFileKind::for_path(Utf8Path::new("a.tat"), "so"),
            Some(RecentFileKind::FilterFile)
        );
        assert_eq!(RecentFileKind::for_path(Utf8Path::new("a.rcnt"), "so"), None);
    }

    #[test]
    fn test_sorted_newest_first_and_trimmed() {
        let dir = TempDir::new().unwrap();
        let mut recent = RecentFiles::new(2);
        recent.add(RecentFileKind::LogFile, &touch(&dir, "a.log"), Some(10));
        recent.add(RecentFileKind::LogFile, &touch(&dir, "b.log"), Some(30));
        recent.add(RecentFileKind::LogFile, &touch(&dir, "c.log"), Some(20));

        let stamps: Vec<i64> = recent.entries().iter().map(|e| e.last_accessed).collect();
        assert_eq!(stamps, vec![30, 20]);
    }

    #[test]
    fn test_missing_file_is_not_added() {
        let dir = TempDir::new().unwrap();
        let missing = Utf8PathBuf::try_from(dir.path().join("gone.log")).unwrap();
        let mut recent = RecentFiles::default();
        recent.add(RecentFileKind::LogFile, &missing, None);
        assert!(recent.is_empty());
    }

    #[test]
    fn test_older_timestamp_does_not_rewind() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "w.lsz");
        let mut recent = RecentFiles::default();
        recent.add(RecentFileKind::WorkspaceFile, &path, Some(100));
        recent.add(RecentFileKind::WorkspaceFile, &path, Some(50));
        assert_eq!(recent.get(&path).unwrap().last_accessed, 100);
        assert_eq!(recent.entries().len(), 1);
    }

    #[test]
    fn test_render_body() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "f.flt");
        let mut recent = RecentFiles::default();
        recent.add(RecentFileKind::FilterFile, &path, Some(7));
        let body = recent.render_body();
        assert!(body.starts_with("<recentfiles>\n"));
        assert!(body.contains(&format!("  <recentfile path=\"{}\" kind=\"1\" timestamp=\"7\" />\n", path)));
        assert!(body.ends_with("</recentfiles>\n"));
    }
}
