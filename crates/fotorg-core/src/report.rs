use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::executor::ExecutionResult;
use crate::monitor::{LogEntry, LogLevel};
use crate::operation::{Operation, OperationKind};

pub const NO_REASON: &str = "NoReason";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogLevelCounts {
    pub info: usize,
    pub warn: usize,
    pub error: usize,
}

impl LogLevelCounts {
    /// Count level labels; unknown labels count as INFO.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts = Self::default();
        for label in labels {
            match LogLevel::from(label) {
                LogLevel::Info => counts.info += 1,
                LogLevel::Warn => counts.warn += 1,
                LogLevel::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.info + self.warn + self.error
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub moved: usize,
    pub skipped: usize,
    pub errored: usize,
    pub log_levels: LogLevelCounts,
    pub skip_reasons: BTreeMap<String, usize>,
    pub destination_folders: BTreeMap<PathBuf, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<usize>,
}

impl ReportSummary {
    /// Skip reasons, most frequent first, ties by name.
    pub fn skip_reasons_by_count(&self) -> Vec<(&str, usize)> {
        let mut reasons: Vec<(&str, usize)> = self
            .skip_reasons
            .iter()
            .map(|(reason, count)| (reason.as_str(), *count))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        reasons
    }

    /// The `n` folders receiving the most files, ties by path.
    pub fn top_folders(&self, n: usize) -> Vec<(&Path, usize)> {
        let mut folders: Vec<(&Path, usize)> = self
            .destination_folders
            .iter()
            .map(|(folder, count)| (folder.as_path(), *count))
            .collect();
        folders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        folders.truncate(n);
        folders
    }
}

/// Aggregates a finished run. Reads its inputs only.
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(
        operations: &[Operation],
        result: &ExecutionResult,
        entries: &[LogEntry],
        duplicates: Option<usize>,
    ) -> ReportSummary {
        let mut skip_reasons = BTreeMap::new();
        let mut destination_folders = BTreeMap::new();

        for op in operations {
            match op.kind {
                OperationKind::Skip => {
                    let reason = if op.reason.is_empty() {
                        NO_REASON.to_string()
                    } else {
                        op.reason.clone()
                    };
                    *skip_reasons.entry(reason).or_insert(0) += 1;
                }
                OperationKind::Move => {
                    let folder = op
                        .effective_destination()
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    *destination_folders.entry(folder).or_insert(0) += 1;
                }
            }
        }

        ReportSummary {
            total: result.total,
            moved: result.moved,
            skipped: result.skipped,
            errored: result.errored,
            log_levels: LogLevelCounts::from_labels(entries.iter().map(|e| e.level.as_str())),
            skip_reasons,
            destination_folders,
            duplicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{LogSink, OperationMonitor};

    #[test]
    fn test_histograms_split_by_kind() {
        let mut collided = Operation::move_to("/in/c.jpg", "/out/2024/01/c.jpg");
        collided.resolved_destination = Some(PathBuf::from("/out/2024/02/c (1).jpg"));
        let ops = vec![
            Operation::move_to("/in/a.jpg", "/out/2024/01/a.jpg"),
            Operation::move_to("/in/b.jpg", "/out/2024/01/b.jpg"),
            collided,
            Operation::skip("/in/d.jpg", "/in/d.jpg", "Duplicate"),
            Operation::skip("/in/e.jpg", "/in/e.jpg", "Duplicate"),
            Operation::skip("/in/f.jpg", "/in/f.jpg", ""),
        ];
        let result = ExecutionResult { total: 6, moved: 3, skipped: 3, errored: 0 };
        let summary = ReportBuilder::build(&ops, &result, &[], Some(2));

        assert_eq!(summary.total, 6);
        assert_eq!(summary.duplicates, Some(2));
        assert_eq!(summary.skip_reasons.get("Duplicate"), Some(&2));
        assert_eq!(summary.skip_reasons.get(NO_REASON), Some(&1));
        assert_eq!(summary.destination_folders.get(Path::new("/out/2024/01")), Some(&2));
        assert_eq!(summary.destination_folders.get(Path::new("/out/2024/02")), Some(&1));
        assert!(!summary.destination_folders.contains_key(Path::new("/in")));
    }

    #[test]
    fn test_log_level_counts() {
        let mut monitor = OperationMonitor::new();
        monitor.record("a", LogLevel::Info, None);
        monitor.record("b", LogLevel::Warn, None);
        monitor.record("c", LogLevel::Error, None);
        monitor.record("d", LogLevel::Info, None);

        let summary =
            ReportBuilder::build(&[], &ExecutionResult::default(), monitor.entries(), None);
        assert_eq!(summary.log_levels, LogLevelCounts { info: 2, warn: 1, error: 1 });

        let odd = LogLevelCounts::from_labels(["warning", "Warn", "", "ERROR"]);
        assert_eq!(odd, LogLevelCounts { info: 2, warn: 1, error: 1 });
        assert_eq!(odd.total(), 4);
    }

    #[test]
    fn test_sorted_views() {
        let mut summary = ReportSummary::default();
        summary.skip_reasons.insert("b".to_string(), 2);
        summary.skip_reasons.insert("a".to_string(), 2);
        summary.skip_reasons.insert("c".to_string(), 5);
        assert_eq!(summary.skip_reasons_by_count(), vec![("c", 5), ("a", 2), ("b", 2)]);

        for (i, name) in ["f1", "f2", "f3", "f4", "f5", "f6"].iter().enumerate() {
            summary.destination_folders.insert(PathBuf::from(name), i + 1);
        }
        let top = summary.top_folders(5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0], (Path::new("f6"), 6));
        assert_eq!(top[4], (Path::new("f2"), 2));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = ReportBuilder::build(&[], &ExecutionResult::default(), &[], None);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total"], 0);
        assert!(json.get("duplicates").is_none());
        assert_eq!(json["log_levels"]["warn"], 0);
    }
}
