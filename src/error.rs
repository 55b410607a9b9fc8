use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Unable to detect media type for '{name}'")]
    DetectionFailed { name: String },

    #[error("Invalid naming input: {reason}")]
    InvalidNamingInput { reason: String },

    #[error("Path {path:?} escapes library root {root:?}")]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("Source not found: {path:?}")]
    SourceNotFound { path: PathBuf },

    #[error("No video files in {path:?} (found: {found:?})")]
    NoVideoFound { path: PathBuf, found: Vec<String> },

    #[error("{first:?} and {second:?} would both be placed at {path:?}")]
    DuplicateDestination {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Media kind is unknown; choose movie or TV before moving")]
    UnknownMediaKind,

    #[error("Transfer of {file:?} failed: {reason}{}", stderr_suffix(.stderr))]
    TransferFailed {
        file: PathBuf,
        reason: String,
        stderr: String,
    },

    #[error("Subtitle copy failed for {path:?}: {reason}")]
    SubtitleCopyFailed { path: PathBuf, reason: String },

    #[error("Cleanup of {path:?} failed: {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Verification of {path:?} failed: {reason}")]
    VerificationFailed { path: PathBuf, reason: String },

    #[error("Not enough space in {root:?}: need {needed} bytes, {available} available")]
    InsufficientSpace {
        root: PathBuf,
        needed: u64,
        available: u64,
    },

    #[error("Transfer of {file:?} was cancelled")]
    Cancelled { file: PathBuf },

    #[error("Transfer of {file:?} timed out after {after:?}")]
    TimedOut { file: PathBuf, after: Duration },

    #[error("Another move is already running on this engine")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl MoveError {
    /// Whether the caller can fix the input (kind/title override) and retry.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::DetectionFailed { .. } | Self::UnknownMediaKind)
    }

    /// Whether retrying the whole move may succeed (the copy tool resumes in place).
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransferFailed { .. }
                | Self::Cancelled { .. }
                | Self::TimedOut { .. }
                | Self::VerificationFailed { .. }
                | Self::Busy
        )
    }
}

pub type Result<T> = std::result::Result<T, MoveError>;
