use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::hashing::{self, HashAlgorithm};

/// Latitude / longitude in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Anything the planner and the organization rules can work from.
///
/// `path` is optional so records coming from elsewhere can be planned even
/// when they cannot name a source file; the planner skips those.
pub trait ItemRecord {
    fn path(&self) -> Option<&Path>;

    fn file_name(&self) -> Option<&OsStr> {
        self.path().and_then(Path::file_name)
    }

    fn capture_time(&self) -> Option<NaiveDateTime>;

    fn location(&self) -> Option<GeoPoint>;

    fn is_duplicate(&self) -> bool;
}

/// One candidate photo on disk.
#[derive(Debug, Clone)]
pub struct Item {
    path: PathBuf,
    /// Capture date (EXIF, or mtime fallback)
    capture_time: Option<NaiveDateTime>,
    location: Option<GeoPoint>,
    /// Hex digest (lazy, None until computed or if the file can't be read)
    content_hash: Option<String>,
    is_duplicate: bool,
}

impl Item {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capture_time: None,
            location: None,
            content_hash: None,
            is_duplicate: false,
        }
    }

    pub fn with_capture_time(mut self, capture_time: NaiveDateTime) -> Self {
        self.capture_time = Some(capture_time);
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn set_capture_time(&mut self, capture_time: Option<NaiveDateTime>) {
        self.capture_time = capture_time;
    }

    pub fn set_location(&mut self, location: Option<GeoPoint>) {
        self.location = location;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capture_time(&self) -> Option<NaiveDateTime> {
        self.capture_time
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn is_duplicate(&self) -> bool {
        self.is_duplicate
    }

    pub fn mark_as_duplicate(&mut self) {
        self.is_duplicate = true;
    }

    /// Hash the file contents. Leaves the hash unset when the path is not a
    /// readable regular file.
    pub fn compute_hash(&mut self, algorithm: HashAlgorithm) {
        let is_file = fs::metadata(&self.path).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            return;
        }
        match hashing::hash_file(&self.path, algorithm) {
            Ok(hash) => self.content_hash = Some(hash),
            Err(e) => log::debug!("hash failed for {}: {}", self.path.display(), e),
        }
    }
}

impl ItemRecord for Item {
    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn capture_time(&self) -> Option<NaiveDateTime> {
        self.capture_time
    }

    fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    fn is_duplicate(&self) -> bool {
        self.is_duplicate
    }
}
