use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the organizing pipeline.
///
/// Per-file problems during planning or execution are never reported here;
/// they become skipped or failed operations instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source folder is missing or is not a directory
    #[error("source does not exist or is not a directory: {}", .0.display())]
    InvalidSource(PathBuf),

    #[error("unknown rule: {0} (use 'data' or 'local')")]
    UnknownRule(String),

    #[error("unknown hash algorithm: {0} (use 'sha256', 'sha512' or 'blake3')")]
    UnknownHashAlgorithm(String),
}

impl Error {
    /// Whether the error stems from bad user input rather than the environment.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidSource(_) | Error::UnknownRule(_) | Error::UnknownHashAlgorithm(_)
        )
    }
}
