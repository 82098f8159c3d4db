//! File system error types.

use thiserror::Error;

/// Errors that can occur while archiving a source tree.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Source directory does not exist or cannot be read.
    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable {
        /// The source path.
        path: String,
        /// Why the source could not be used.
        reason: String,
    },

    /// Invalid glob pattern in an exclude rule.
    #[error("Invalid glob pattern: {pattern}: {reason}")]
    InvalidGlobPattern {
        /// The invalid pattern.
        pattern: String,
        /// Reason why it's invalid.
        reason: String,
    },

    /// Entry path cannot be stored in the archive.
    #[error("Invalid path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: String,
    },

    /// IO error.
    #[error("IO error at {path}: {source}")]
    IoError {
        /// Path where error occurred.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FileSystemError {
    /// Create an IoError from std::io::Error.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `source` - The underlying IO error
    pub fn io_error(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Create a SourceUnavailable error.
    ///
    /// # Arguments
    /// * `path` - The source path
    /// * `reason` - Human readable cause
    pub fn source_unavailable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
