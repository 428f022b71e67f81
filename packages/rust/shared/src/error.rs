//! Error types for tabreport.
//!
//! Library crates use [`TabreportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all tabreport operations.
#[derive(Debug, thiserror::Error)]
pub enum TabreportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure against an external collaborator (object store,
    /// enrichment API, wire peer, or webhook endpoint).
    #[error("transport error: {0}")]
    Transport(String),

    /// CSV or payload parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error. The original store error text is
    /// preserved so failure notifications can carry it verbatim.
    #[error("storage error: {0}")]
    Storage(String),

    /// Document validation error (well-formedness or schema rule).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Malformed wire frame (bad length prefix, truncated body, bad JSON).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TabreportError>;

impl TabreportError {
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

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
