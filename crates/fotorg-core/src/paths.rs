use std::fs;
use std::path::{Component, Path, PathBuf};

/// Absolute path with `.`/`..` folded and symlinks resolved as far as the
/// path exists on disk.
pub fn resolve(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized = normalize(&absolute);

    let mut tail = Vec::new();
    let mut current = normalized.as_path();
    while let (Some(parent), Some(name)) = (current.parent(), current.file_name()) {
        tail.push(name.to_os_string());
        current = parent;
        if let Ok(mut real) = fs::canonicalize(current) {
            for part in tail.iter().rev() {
                real.push(part);
            }
            return real;
        }
    }
    normalized
}

pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether anything (file, directory, dangling symlink) sits at `path`.
pub fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
