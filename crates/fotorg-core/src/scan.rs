use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Lowercase extensions picked up by a scan
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff", "heic"];

pub fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PHOTO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Photo discovery under a source folder.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    /// Stop after this many files
    pub limit: Option<usize>,
    /// Subtree left alone (usually the destination when it sits inside the source)
    pub exclude: Option<PathBuf>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude = Some(dir.into());
        self
    }

    /// Recursive walk in file-name order. Unreadable entries are skipped.
    pub fn scan(&self, source: &Path) -> Vec<PathBuf> {
        let limit = self.limit.unwrap_or(usize::MAX);
        let mut found = Vec::new();
        if limit == 0 {
            return found;
        }

        let walker = WalkDir::new(source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| match &self.exclude {
                Some(skip) => e.path() != skip.as_path(),
                None => true,
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("scan: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_photo(entry.path()) {
                continue;
            }
            found.push(entry.into_path());
            if found.len() >= limit {
                break;
            }
        }

        log::debug!("found {} photo(s) under {}", found.len(), source.display());
        found
    }
}
