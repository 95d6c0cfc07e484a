use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::operation::Operation;

const LOG_TARGET: &str = "fotorg::monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parse: anything that is not WARN or ERROR counts as INFO.
impl From<&str> for LogLevel {
    fn from(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("warn") {
            LogLevel::Warn
        } else if label.trim().eq_ignore_ascii_case("error") {
            LogLevel::Error
        } else {
            LogLevel::Info
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    /// Snapshot of the operation at the time of the entry
    pub operation: Option<Operation>,
}

/// Destination for execution log entries.
pub trait LogSink {
    fn record(&mut self, message: &str, level: LogLevel, operation: Option<&Operation>);
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    fn record(&mut self, message: &str, level: LogLevel, operation: Option<&Operation>) {
        (**self).record(message, level, operation)
    }
}

/// In-memory log of one run. Every entry is also forwarded to the `log`
/// facade.
#[derive(Debug, Default)]
pub struct OperationMonitor {
    entries: Vec<LogEntry>,
}

impl OperationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

impl LogSink for OperationMonitor {
    fn record(&mut self, message: &str, level: LogLevel, operation: Option<&Operation>) {
        match level {
            LogLevel::Info => log::info!(target: LOG_TARGET, "{}", message),
            LogLevel::Warn => log::warn!(target: LOG_TARGET, "{}", message),
            LogLevel::Error => log::error!(target: LOG_TARGET, "{}", message),
        }
        self.entries.push(LogEntry {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
            operation: operation.cloned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_labels() {
        assert_eq!(LogLevel::from("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::from("warn"), LogLevel::Warn);
        assert_eq!(LogLevel::from("Error"), LogLevel::Error);
        assert_eq!(LogLevel::from("warning"), LogLevel::Info);
        assert_eq!(LogLevel::from(""), LogLevel::Info);
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_monitor_keeps_entries_in_order() {
        let mut monitor = OperationMonitor::new();
        let op = Operation::move_to("/a.jpg", "/b/a.jpg");
        monitor.record("first", LogLevel::Info, None);
        monitor.record("second", LogLevel::Warn, Some(&op));

        let entries = monitor.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert!(entries[0].operation.is_none());
        assert_eq!(entries[1].level, LogLevel::Warn);
        assert_eq!(entries[1].operation.as_ref(), Some(&op));
        assert!(entries[0].timestamp <= entries[1].timestamp);

        monitor.clear();
        assert!(monitor.entries().is_empty());
    }

    #[test]
    fn test_borrowed_sink_records_into_owner() {
        fn write_to<S: LogSink>(mut sink: S) {
            sink.record("via borrow", LogLevel::Error, None);
        }

        let mut monitor = OperationMonitor::new();
        write_to(&mut monitor);
        assert_eq!(monitor.messages().collect::<Vec<_>>(), vec!["via borrow"]);
    }
}
