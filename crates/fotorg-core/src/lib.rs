pub mod duplicates;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod item;
pub mod metadata;
pub mod monitor;
pub mod operation;
pub mod paths;
pub mod planner;
pub mod report;
pub mod rule;
pub mod scan;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use duplicates::{DuplicateDetector, DuplicateGroup};
pub use error::{Error, Result};
pub use executor::{ExecutionResult, OpOutcome, OperationExecutor};
pub use hashing::HashAlgorithm;
pub use item::{GeoPoint, Item, ItemRecord};
pub use monitor::{LogEntry, LogLevel, LogSink, OperationMonitor};
pub use operation::{Operation, OperationKind};
pub use planner::OperationPlanner;
pub use report::{ReportBuilder, ReportSummary};
pub use rule::{ByDate, ByLocation, OrganizationRule, RuleKind};

/// Folder created next to the source when no destination is given
pub const DEFAULT_DESTINATION_NAME: &str = "Foto_Organizada";

fn default_precision() -> usize {
    rule::DEFAULT_PRECISION
}

fn default_preview() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOptions {
    pub source: PathBuf,
    /// Defaults to `<source parent>/Foto_Organizada`
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub rule: RuleKind,
    /// Decimal places of the GPS folder names
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Simulate only; nothing on disk changes
    #[serde(default = "default_preview")]
    pub preview: bool,
}

impl OrganizeOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            rule: RuleKind::default(),
            precision: rule::DEFAULT_PRECISION,
            limit: None,
            hash_algorithm: HashAlgorithm::default(),
            preview: true,
        }
    }

    pub fn destination(&self) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| default_destination(&self.source))
    }
}

/// `<parent of source>/Foto_Organizada`; the source itself when it has no parent.
pub fn default_destination(source: &Path) -> PathBuf {
    let source = paths::resolve(source);
    source
        .parent()
        .unwrap_or(&source)
        .join(DEFAULT_DESTINATION_NAME)
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeOutcome {
    pub preview: bool,
    pub destination: PathBuf,
    pub items: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub operations: Vec<Operation>,
    pub result: ExecutionResult,
    pub entries: Vec<LogEntry>,
    pub summary: ReportSummary,
}

/// Type alias for progress callback: (stage, current, total, message)
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + 'a;

/// Throttled progress reporter; emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Cell<Option<Instant>>,
}

impl<'a> ThrottledProgress<'a> {
    const INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: Cell::new(None),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current >= total;
        if !is_done {
            if let Some(last) = self.last_emit.get() {
                if last.elapsed() < Self::INTERVAL {
                    return;
                }
            }
            self.last_emit.set(Some(Instant::now()));
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Source scanned, items built, duplicates flagged and the plan computed.
/// Nothing on disk has changed yet.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    destination: PathBuf,
    items: usize,
    groups: Vec<DuplicateGroup>,
    duplicates: usize,
    plan: Vec<Operation>,
}

impl PreparedRun {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn duplicate_groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn plan(&self) -> &[Operation] {
        &self.plan
    }

    /// Execute a copy of the plan. Can be called for a preview and then again
    /// for real.
    pub fn execute(&self, preview: bool, progress: &ProgressCallback<'_>) -> OrganizeOutcome {
        let tp = ThrottledProgress::new(progress);
        let stage = if preview { "preview" } else { "move" };
        let mut operations = self.plan.clone();

        let mut executor = OperationExecutor::new();
        let result = executor.execute_with(&mut operations, preview, |done, total| {
            tp.report(stage, done as u64, total as u64, "");
        });
        let entries = executor.into_sink().into_entries();
        let summary = ReportBuilder::build(&operations, &result, &entries, Some(self.duplicates));

        OrganizeOutcome {
            preview,
            destination: self.destination.clone(),
            items: self.items,
            duplicate_groups: self.groups.clone(),
            operations,
            result,
            entries,
            summary,
        }
    }
}

/// Scan, read metadata, hash, detect duplicates and plan.
pub fn prepare(options: &OrganizeOptions, progress: &ProgressCallback<'_>) -> Result<PreparedRun> {
    if !options.source.is_dir() {
        return Err(Error::InvalidSource(options.source.clone()));
    }
    let tp = ThrottledProgress::new(progress);
    let destination = options.destination();

    // Stage 1: discover photos
    let mut scanner = scan::Scanner::new().with_limit(options.limit);
    // Exclude the destination under the spelling the walk produces
    if let Ok(inner) = paths::resolve(&destination).strip_prefix(paths::resolve(&options.source)) {
        scanner = scanner.excluding(options.source.join(inner));
    }
    let files = scanner.scan(&options.source);
    let total = files.len() as u64;
    tp.report("scan", total, total, &format!("{} photo(s) found", total));

    // Stage 2: metadata and content hashes
    let mut items = Vec::with_capacity(files.len());
    for (i, path) in files.into_iter().enumerate() {
        let meta = metadata::read_metadata(&path);
        let mut item = Item::new(path);
        item.set_capture_time(meta.capture_time);
        item.set_location(meta.location);
        item.compute_hash(options.hash_algorithm);
        tp.report(
            "read",
            i as u64 + 1,
            total,
            &item.path().file_name().unwrap_or_default().to_string_lossy(),
        );
        items.push(item);
    }

    // Stage 3: duplicates
    let detector = DuplicateDetector::new(options.hash_algorithm);
    let groups = detector.detect(&mut items);
    let duplicates: usize = groups.iter().map(|g| g.duplicates().len()).sum();
    tp.report(
        "dedup",
        1,
        1,
        &format!("{} duplicate(s) in {} group(s)", duplicates, groups.len()),
    );

    // Stage 4: plan
    let planner = OperationPlanner::new(options.rule.build(options.precision), &destination);
    let plan = planner.generate(&items);

    Ok(PreparedRun {
        destination,
        items: items.len(),
        groups,
        duplicates,
        plan,
    })
}

/// Run the full pipeline once, in preview or for real per `options.preview`.
pub fn organize(options: &OrganizeOptions, progress: &ProgressCallback<'_>) -> Result<OrganizeOutcome> {
    Ok(prepare(options, progress)?.execute(options.preview, progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_default_destination_is_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("camera");
        std::fs::create_dir(&source).unwrap();
        assert_eq!(
            default_destination(&source),
            paths::resolve(dir.path()).join("Foto_Organizada")
        );
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: OrganizeOptions = serde_json::from_str(r#"{"source": "/photos"}"#).unwrap();
        assert_eq!(options.rule, RuleKind::ByDate);
        assert_eq!(options.precision, 3);
        assert_eq!(options.hash_algorithm, HashAlgorithm::Sha256);
        assert!(options.destination.is_none());
        assert!(options.preview);

        let options: OrganizeOptions =
            serde_json::from_str(r#"{"source": "/p", "rule": "local", "hash_algorithm": "blake3"}"#)
                .unwrap();
        assert_eq!(options.rule, RuleKind::ByLocation);
        assert_eq!(options.hash_algorithm, HashAlgorithm::Blake3);
    }

    #[test]
    fn test_throttled_progress_always_emits_completion() {
        let calls = RefCell::new(Vec::new());
        let cb = |stage: &str, current: u64, total: u64, _msg: &str| {
            calls.borrow_mut().push((stage.to_string(), current, total));
        };
        let tp = ThrottledProgress::new(&cb);
        tp.report("read", 1, 10, "");
        tp.report("read", 2, 10, "");
        tp.report("read", 10, 10, "");

        let calls = calls.into_inner();
        assert_eq!(calls.first(), Some(&("read".to_string(), 1, 10)));
        assert_eq!(calls.last(), Some(&("read".to_string(), 10, 10)));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_missing_source_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let options = OrganizeOptions::new(dir.path().join("missing"));
        let err = organize(&options, &|_, _, _, _| {}).unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
        assert!(err.is_invalid_input());
    }
}
