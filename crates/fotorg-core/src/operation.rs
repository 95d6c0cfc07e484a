use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub const REASON_OK: &str = "OK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Move,
    Skip,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Move => f.write_str("MOVE"),
            OperationKind::Skip => f.write_str("SKIP"),
        }
    }
}

/// One planned action. Describes what would happen; executing it is the
/// executor's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub source: PathBuf,
    /// Destination as planned
    pub destination: PathBuf,
    pub kind: OperationKind,
    pub reason: String,
    /// Set by the executor when a collision forced a different name
    pub resolved_destination: Option<PathBuf>,
}

impl Operation {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        kind: OperationKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
            reason: reason.into(),
            resolved_destination: None,
        }
    }

    pub fn move_to(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(source, destination, OperationKind::Move, REASON_OK)
    }

    pub fn skip(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(source, destination, OperationKind::Skip, reason)
    }

    pub fn is_move(&self) -> bool {
        self.kind == OperationKind::Move
    }

    pub fn effective_destination(&self) -> &Path {
        self.resolved_destination.as_deref().unwrap_or(&self.destination)
    }
}
