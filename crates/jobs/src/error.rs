//! Error types for bundling and job configuration.

use rusty_bundles_filesystem::FileSystemError;
use rusty_bundles_model::ModelError;
use rusty_bundles_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while bundling artifacts or rendering job configuration.
#[derive(Debug, Error)]
pub enum JobsError {
    /// A required environment value is absent.
    ///
    /// Fatal for the whole batch, since every job shares one rendered template set.
    #[error("Missing environment variable: {variable}")]
    MissingEnvironment {
        /// Name of the environment variable.
        variable: String,
    },

    /// Settings file could not be read or is invalid.
    #[error("Invalid settings in {path}: {message}")]
    Settings {
        /// Settings source.
        path: String,
        /// Error message.
        message: String,
    },

    /// Backend name not recognised.
    #[error("Unknown backend: {name}")]
    UnknownBackend {
        /// The name given.
        name: String,
    },

    /// A blocking task panicked or was aborted.
    #[error("Task failed: {message}")]
    Task {
        /// Error message.
        message: String,
    },

    /// File system error.
    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),

    /// Artifact model error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl JobsError {
    /// Create a settings error.
    pub fn settings(path: impl Into<String>, message: impl Into<String>) -> Self {
        JobsError::Settings {
            path: path.into(),
            message: message.into(),
        }
    }
}
