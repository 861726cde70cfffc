//! Error types for noticescore.
//!
//! Library crates use [`NoticeScoreError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Feed anomalies (a notice without a URL, a notice without an identifier)
//! never reach this type: the correlator absorbs them. Everything here is
//! fatal to the run that raised it.

use std::path::PathBuf;

/// Top-level error type for all noticescore operations.
#[derive(Debug, thiserror::Error)]
pub enum NoticeScoreError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Feed document could not be parsed into notices.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The classifier artifact is missing, unreadable, or inconsistent.
    #[error("model load error for {path:?}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    /// The classifier produced unusable output for a batch it was given.
    #[error("scoring error: {0}")]
    Scoring(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NoticeScoreError>;

impl NoticeScoreError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a model load error for the artifact at `path`.
    pub fn model_load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a scoring error from any displayable message.
    pub fn scoring(msg: impl Into<String>) -> Self {
        Self::Scoring(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
