//! Path helpers for workspace relative file references.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where possible.
fn normalize(path: &Utf8Path) -> Vec<Utf8Component<'_>> {
    let mut out: Vec<Utf8Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.last() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            _ => out.push(component),
        }
    }
    out
}

/// Express `path` relative to `base_dir`.
///
/// Relative paths are returned unchanged, as are paths that share no root
/// with `base_dir` (e.g. another drive on Windows).
pub fn relative_path(path: &Utf8Path, base_dir: &Utf8Path) -> Utf8PathBuf {
    if path.is_relative() || base_dir.as_str().is_empty() {
        return path.to_path_buf();
    }

    let target = normalize(path);
    let base = normalize(base_dir);

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 {
        return path.to_path_buf();
    }

    let mut relative = Utf8PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_str());
    }

    if relative.as_str().is_empty() {
        Utf8PathBuf::from(".")
    } else {
        relative
    }
}

/// Turn a possibly relative file reference into an absolute path.
///
/// Relative references are joined onto `base_dir`, or onto the current
/// directory without one. Existing files are canonicalized.
pub fn resolve(path: &Utf8Path, base_dir: Option<&Utf8Path>) -> Utf8PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match base_dir {
            Some(dir) if !dir.as_str().is_empty() => dir.join(path),
            _ => match std::env::current_dir()
                .ok()
                .and_then(|cwd| Utf8PathBuf::from_path_buf(cwd).ok())
            {
                Some(cwd) => cwd.join(path),
                None => path.to_path_buf(),
            },
        }
    };

    joined.canonicalize_utf8().unwrap_or(joined)
}

/// Directory of `file`, or `None` for a bare file name
pub fn parent_dir(file: &Utf8Path) -> Option<&Utf8Path> {
    file.parent().filter(|p| !p.as_str().is_empty())
}
