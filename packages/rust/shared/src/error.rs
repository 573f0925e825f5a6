//! Error types for IssuePress.
//!
//! Library crates use [`IssuePressError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all IssuePress operations.
#[derive(Debug, thiserror::Error)]
pub enum IssuePressError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// One or more required external executables are missing.
    /// Collected in aggregate before any stage runs.
    #[error("required tools not found:\n{}", missing.join("\n"))]
    ToolNotFound { missing: Vec<String> },

    /// The index page has no link for the requested issue.
    #[error("cannot find the URL of the requested issue: {reason}")]
    IssueNotFound { reason: String },

    /// The mirroring tool produced no page file.
    #[error("issue download error: no page found in {dir:?}")]
    FetchFailed { dir: PathBuf },

    /// The mirrored page has no content container.
    #[error("could not find <{selector}> in {path:?}")]
    DeclutterFailed { path: PathBuf, selector: String },

    /// An external command exited unsuccessfully.
    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Cover image composition produced no usable image.
    #[error("cover error: {0}")]
    CoverFailed(String),

    /// Ebook conversion produced a missing or empty output.
    #[error("conversion error: {0}")]
    ConversionFailed(String),

    /// Catalog query or mutation error.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Network/HTTP error during issue discovery.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Content bundle (zip) creation error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad month, invalid manifest, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IssuePressError>;

impl IssuePressError {
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

    /// Create an issue-not-found error.
    pub fn issue_not_found(reason: impl Into<String>) -> Self {
        Self::IssueNotFound {
            reason: reason.into(),
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
