//! Error types for artifact model operations.

use thiserror::Error;

use crate::replica::UNREPLICATED;

/// Errors that can occur while naming or planning artifacts.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Replica count is negative and not the unreplicated sentinel.
    #[error(
        "Invalid replica count {count}: expected a positive count, 0, or {} for an unreplicated artifact",
        UNREPLICATED
    )]
    InvalidReplicaCount {
        /// The rejected count.
        count: i64,
    },

    /// Logical artifact name cannot be used in a filename.
    #[error("Invalid artifact name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// Canonical path has no file name component.
    #[error("Invalid canonical path: {path:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// IO error while reading an archive.
    #[error("IO error at {path}: {source}")]
    IoError {
        /// Path where the error occurred.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_replica_count_message() {
        let err: ModelError = ModelError::InvalidReplicaCount { count: -7 };
        let msg: String = err.to_string();
        assert!(msg.contains("-7"));
        assert!(msg.contains("-1"));
    }
}
